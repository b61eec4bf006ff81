//! lorarx error types with granular categories

use thiserror::Error;

/// Top-level error type for all lorarx-core operations
#[derive(Debug, Error)]
pub enum LoraError {
    #[error("invalid parameter: {0}")]
    InvalidParam(#[from] ParamError),

    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    #[error("header error: {0}")]
    Header(#[from] HeaderError),

    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),
}

/// Construction-time parameter validation failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("spreading factor {sf} out of supported range (5-12)")]
    SpreadingFactorOutOfRange { sf: i32 },

    #[error("bandwidth must be positive, got {bandwidth_hz} Hz")]
    InvalidBandwidth { bandwidth_hz: i64 },

    #[error("sample rate must be positive, got {sample_rate_hz} Hz")]
    InvalidSampleRate { sample_rate_hz: i64 },

    #[error("sample rate {sample_rate_hz} Hz is not an integer multiple of bandwidth {bandwidth_hz} Hz")]
    NonIntegerOversampling {
        sample_rate_hz: i64,
        bandwidth_hz: i64,
    },

    #[error("sync word {sync_word:#x} does not fit in 8 bits")]
    SyncWordOutOfRange { sync_word: u32 },

    #[error("implicit header payload length {payload_length} out of range [1,255]")]
    ImplicitPayloadLengthOutOfRange { payload_length: i32 },

    #[error("implicit header coding rate {cr} out of range [1,4]")]
    ImplicitCodingRateOutOfRange { cr: i32 },

    #[error("FFT length {size} is not a power of two")]
    NonPowerOfTwoLength { size: usize },
}

/// IQ file loading failures
#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to open IQ file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read IQ file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IQ file {path} size is not aligned to complex64 samples (8 bytes)")]
    Unaligned { path: String },
}

/// Header-stage decode failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header symbol width ppm={ppm} below minimum of 5")]
    PpmTooSmall { ppm: usize },

    #[error("header row {row} failed Hamming(8,4) correction")]
    Uncorrectable { row: usize },

    #[error("header CRC-5 mismatch")]
    Fcs,
}

/// Payload-stage decode failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("computed payload symbol count is non-positive")]
    InvalidSymbolCount,

    #[error("payload length {payload_length} out of range for CRC-16 table lookup [5,255]")]
    LengthOutOfCrcRange { payload_length: usize },
}

/// Result type alias for lorarx-core operations
pub type Result<T> = std::result::Result<T, LoraError>;
