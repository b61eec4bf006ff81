//! lorarx-core
//!
//! Software-defined LoRa PHY receiver: chirp/FFT primitives, preamble
//! detection and frame synchronization, header and payload decoding, and
//! both a one-shot batch receiver and an incremental streaming receiver
//! built on the same demodulation path.

pub mod bits;
pub mod chirp;
pub mod config;
pub mod errors;
pub mod fft;
pub mod header;
pub mod logging;
pub mod payload;
pub mod preamble;
pub mod receiver;
pub mod streaming;
pub mod sync;
pub mod syncword;
pub mod tables;

pub use config::DecodeParams;
pub use errors::LoraError;
pub use receiver::{DecodeResult, Receiver};
pub use streaming::{FrameEvent, StreamingReceiver};
