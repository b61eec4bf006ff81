//! Batch receiver (C8): wires C4 -> C5 -> C6 -> C7 over a complete sample
//! buffer.

use std::cell::{Ref, RefCell};

use num_complex::Complex64;

use crate::config::DecodeParams;
use crate::errors::{LoraError, ParamError};
use crate::header::{HeaderDecodeResult, HeaderDecoder};
use crate::logging::{LogConfig, SignalLogger, Subsystem};
use crate::payload::PayloadDecoder;
use crate::sync::FrameSynchronizer;
use crate::syncword::SyncWordValidator;

/// Outcome of a single decode attempt. Each stage's flag stays false once an
/// earlier stage fails, so a caller can tell at a glance where a frame was
/// lost.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeResult {
    pub success: bool,
    pub frame_synced: bool,
    pub header_ok: bool,
    pub payload_crc_ok: bool,
    pub payload: Vec<u8>,
    pub raw_payload_symbols: Vec<i64>,
    pub p_ofs_est: isize,
    pub header_payload_length: i32,
}

#[derive(Debug)]
pub struct Receiver {
    params: DecodeParams,
    frame_sync: FrameSynchronizer,
    sync_detector: SyncWordValidator,
    header_decoder: HeaderDecoder,
    payload_decoder: PayloadDecoder,
    logger: RefCell<SignalLogger>,
}

impl Receiver {
    pub fn new(params: DecodeParams) -> Result<Self, LoraError> {
        Self::with_log_config(params, LogConfig::default())
    }

    pub fn with_log_config(params: DecodeParams, log_config: LogConfig) -> Result<Self, LoraError> {
        params.validate()?;
        Ok(Self {
            frame_sync: FrameSynchronizer::new(&params),
            sync_detector: SyncWordValidator::new(&params),
            header_decoder: HeaderDecoder::new(&params),
            payload_decoder: PayloadDecoder::new(&params),
            logger: RefCell::new(SignalLogger::new(log_config)),
            params,
        })
    }

    /// Log entries emitted by the most recent `decode_samples` call.
    pub fn logger(&self) -> Ref<'_, SignalLogger> {
        self.logger.borrow()
    }

    /// Run the full decode pipeline over a complete IQ buffer.
    pub fn decode_samples(&self, samples: &[Complex64]) -> Result<DecodeResult, LoraError> {
        let mut result = DecodeResult::default();
        self.logger.borrow_mut().clear();

        let sync = match self.frame_sync.synchronize(samples) {
            Some(s) => s,
            None => {
                self.logger
                    .borrow_mut()
                    .debug(Subsystem::Sync, None, "no preamble/frame sync found");
                return Ok(result);
            }
        };
        result.frame_synced = true;
        result.p_ofs_est = sync.p_ofs_est;
        let sample_index = Some(sync.p_ofs_est.max(0) as usize);
        self.logger.borrow_mut().info(
            Subsystem::Sync,
            sample_index,
            format!("frame synced cfo_hz={:.1}", sync.cfo_hz),
        );

        if !self.params.skip_sync_word_check {
            let sync_word = self.sync_detector.analyze(samples, sync.preamble_offset, sync.cfo_hz);
            match sync_word {
                Some(detection) if detection.sync_ok => {}
                _ => {
                    self.logger
                        .borrow_mut()
                        .warn(Subsystem::Sync, sample_index, "sync word mismatch");
                    return Ok(result);
                }
            }
        } else {
            self.logger
                .borrow_mut()
                .trace(Subsystem::Sync, sample_index, "sync word check skipped");
        }

        let header = if self.params.implicit_header {
            if self.params.implicit_payload_length == 0
                || !(1..=4).contains(&self.params.implicit_cr)
            {
                return Err(LoraError::InvalidParam(
                    ParamError::ImplicitPayloadLengthOutOfRange {
                        payload_length: self.params.implicit_payload_length as i32,
                    },
                ));
            }
            result.header_ok = true;
            HeaderDecodeResult {
                implicit_header: true,
                raw_symbols: Vec::new(),
                fcs_ok: true,
                payload_length: self.params.implicit_payload_length as i32,
                has_crc: self.params.implicit_has_crc,
                cr: self.params.implicit_cr as i32,
                payload_header_bits: Vec::new(),
            }
        } else {
            match self.header_decoder.decode(samples, &sync)? {
                Some(h) if h.fcs_ok => {
                    result.header_ok = true;
                    h
                }
                _ => {
                    self.logger
                        .borrow_mut()
                        .warn(Subsystem::Header, sample_index, "header FCS check failed");
                    return Ok(result);
                }
            }
        };
        result.header_payload_length = header.payload_length;
        self.logger.borrow_mut().info(
            Subsystem::Header,
            sample_index,
            format!(
                "payload_length={} cr={} has_crc={}",
                header.payload_length, header.cr, header.has_crc
            ),
        );

        let payload = match self
            .payload_decoder
            .decode(samples, &sync, &header, self.params.ldro_enabled)?
        {
            Some(p) => p,
            None => {
                self.logger.borrow_mut().error(
                    Subsystem::Payload,
                    sample_index,
                    "payload decode failed: insufficient samples",
                );
                return Ok(result);
            }
        };

        result.payload_crc_ok = payload.crc_ok;
        result.payload = payload.bytes;
        result.raw_payload_symbols = payload.raw_symbols;
        result.success = result.payload_crc_ok;

        if header.has_crc {
            if result.payload_crc_ok {
                self.logger.borrow_mut().info(Subsystem::Crc, sample_index, "payload CRC ok");
            } else {
                self.logger.borrow_mut().warn(Subsystem::Crc, sample_index, "payload CRC mismatch");
            }
        }
        self.logger.borrow_mut().info(
            Subsystem::Payload,
            sample_index,
            format!("decoded {} payload bytes", result.payload.len()),
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_unsynced_result_on_empty_buffer() {
        let params = DecodeParams::new(7, 125_000, 500_000).unwrap();
        let receiver = Receiver::new(params).unwrap();
        let result = receiver.decode_samples(&[]).unwrap();
        assert!(!result.frame_synced);
        assert!(!result.success);
    }

    #[test]
    fn rejects_invalid_spreading_factor() {
        let mut params = DecodeParams::new(7, 125_000, 500_000).unwrap();
        params.sf = 20;
        assert!(Receiver::new(params).is_err());
    }
}
