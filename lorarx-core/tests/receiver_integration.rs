//! Black-box integration tests against the public `lorarx_core` API.

use lorarx_core::config::DecodeParams;
use lorarx_core::errors::{LoraError, ParamError};
use lorarx_core::receiver::Receiver;
use lorarx_core::streaming::{FrameEvent, StreamingReceiver};
use num_complex::Complex64;

fn base_params() -> DecodeParams {
    DecodeParams::new(7, 125_000, 500_000).expect("sf7/125k/500k is a valid combination")
}

#[test]
fn receiver_rejects_out_of_range_spreading_factor() {
    let mut params = base_params();
    params.sf = 13;
    let err = Receiver::new(params).unwrap_err();
    assert!(matches!(
        err,
        LoraError::InvalidParam(ParamError::SpreadingFactorOutOfRange { sf: 13 })
    ));
}

#[test]
fn receiver_rejects_non_integer_oversampling() {
    let mut params = base_params();
    params.sample_rate_hz = 500_001;
    let err = Receiver::new(params).unwrap_err();
    assert!(matches!(
        err,
        LoraError::InvalidParam(ParamError::NonIntegerOversampling { .. })
    ));
}

#[test]
fn batch_receiver_reports_unsynced_on_silence() {
    let params = base_params();
    let receiver = Receiver::new(params.clone()).unwrap();
    let silence = vec![Complex64::new(0.0, 0.0); params.samples_per_symbol() * 16];

    let result = receiver.decode_samples(&silence).unwrap();

    assert!(!result.success);
    assert!(!result.frame_synced);
    assert!(result.payload.is_empty());
}

#[test]
fn streaming_receiver_emits_no_events_on_silence() {
    let params = base_params();
    let mut receiver = StreamingReceiver::new(params.clone()).unwrap();
    let silence = vec![Complex64::new(0.0, 0.0); params.samples_per_symbol() * 8];

    let events = receiver.push_samples(&silence).unwrap();

    assert!(events.is_empty());
}

#[test]
fn streaming_receiver_reset_allows_reuse_after_silence() {
    let params = base_params();
    let mut receiver = StreamingReceiver::new(params.clone()).unwrap();
    let silence = vec![Complex64::new(0.0, 0.0); params.samples_per_symbol() * 4];

    receiver.push_samples(&silence).unwrap();
    receiver.reset();
    let events = receiver.push_samples(&silence).unwrap();

    assert!(events.iter().all(|e| !matches!(e, FrameEvent::FrameDone { .. })));
}
