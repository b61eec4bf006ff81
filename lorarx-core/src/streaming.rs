//! Streaming receiver (C9): drives the batch components over a chunked
//! input stream, emitting events as each stage of a frame completes.

use num_complex::Complex64;

use crate::config::DecodeParams;
use crate::errors::LoraError;
use crate::header::{HeaderDecodeResult, HeaderDecoder};
use crate::logging::{LogConfig, SignalLogger, Subsystem};
use crate::payload::PayloadDecoder;
use crate::receiver::DecodeResult;
use crate::sync::{FrameSyncResult, StreamingFrameSynchronizer};

/// One event surfaced by a `push_samples` call. Multiple events can be
/// emitted per call; within a call they always appear in this order:
/// `SyncAcquired`, `HeaderDecoded`, zero or more `PayloadByte`, then a
/// terminal `FrameDone`/`FrameError`.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    SyncAcquired { global_sample_index: usize },
    HeaderDecoded {
        global_sample_index: usize,
        payload_length: i32,
        has_crc: bool,
        cr: i32,
    },
    PayloadByte {
        global_sample_index: usize,
        index: usize,
        byte: u8,
    },
    FrameDone {
        global_sample_index: usize,
        result: DecodeResult,
    },
    FrameError { global_sample_index: usize },
}

struct PendingFrame {
    preamble_offset: usize,
    global_sample_index: usize,
    sync: FrameSyncResult,
    header: Option<HeaderDecodeResult>,
    header_reported: bool,
    samples_needed: Option<usize>,
}

pub struct StreamingReceiver {
    params: DecodeParams,
    synchronizer: StreamingFrameSynchronizer,
    header_decoder: HeaderDecoder,
    payload_decoder: PayloadDecoder,
    capture: Vec<Complex64>,
    capture_global_offset: usize,
    pending: Option<PendingFrame>,
    sps: usize,
    nrise: usize,
    logger: SignalLogger,
}

impl StreamingReceiver {
    pub fn new(params: DecodeParams) -> Result<Self, LoraError> {
        Self::with_log_config(params, LogConfig::default())
    }

    pub fn with_log_config(params: DecodeParams, log_config: LogConfig) -> Result<Self, LoraError> {
        params.validate()?;
        Ok(Self {
            synchronizer: StreamingFrameSynchronizer::new(&params),
            header_decoder: HeaderDecoder::new(&params),
            payload_decoder: PayloadDecoder::new(&params),
            capture: Vec::new(),
            capture_global_offset: 0,
            pending: None,
            sps: params.samples_per_symbol(),
            nrise: params.rise_samples(),
            logger: SignalLogger::new(log_config),
            params,
        })
    }

    /// Log entries accumulated across every `push_samples` call so far.
    pub fn logger(&self) -> &SignalLogger {
        &self.logger
    }

    fn header_offset_samples(&self) -> usize {
        self.nrise + 12 * self.sps + self.sps / 4
    }

    fn payload_offset_samples(&self) -> usize {
        self.header_offset_samples() + if self.params.implicit_header { 0 } else { 8 * self.sps }
    }

    /// Feed the next chunk of samples and drain any events it produces.
    pub fn push_samples(&mut self, chunk: &[Complex64]) -> Result<Vec<FrameEvent>, LoraError> {
        let mut events = Vec::new();
        self.capture.extend_from_slice(chunk);

        let sync_result = if self.pending.is_none() {
            self.synchronizer.update(chunk)
        } else {
            None
        };

        if self.pending.is_none() {
            let keep = self.synchronizer.buffer().len();
            if self.capture.len() > keep {
                let drop = self.capture.len() - keep;
                self.capture.drain(0..drop);
                self.capture_global_offset += drop;
            }

            if let Some(sync) = sync_result {
                let base_in_capture =
                    self.synchronizer.buffer_global_offset() - self.capture_global_offset;
                let preamble_offset = base_in_capture + sync.preamble_offset as usize;
                let global_sample_index = self.capture_global_offset + preamble_offset;
                let local_sync = FrameSyncResult {
                    preamble_offset: 0,
                    p_ofs_est: sync.p_ofs_est - sync.preamble_offset,
                    cfo_hz: sync.cfo_hz,
                };
                self.pending = Some(PendingFrame {
                    preamble_offset,
                    global_sample_index,
                    sync: local_sync,
                    header: None,
                    header_reported: false,
                    samples_needed: None,
                });
                self.logger.info(
                    Subsystem::Sync,
                    Some(global_sample_index),
                    format!("frame synced cfo_hz={:.1}", sync.cfo_hz),
                );
                events.push(FrameEvent::SyncAcquired { global_sample_index });
            }
        }

        let payload_offset_samples = self.payload_offset_samples();
        let header_offset_samples = self.header_offset_samples();

        let Some(pending) = self.pending.as_mut() else {
            return Ok(events);
        };

        if pending.header.is_none() {
            let guard = pending.sync.p_ofs_est.max(0) as usize;

            if self.params.implicit_header {
                let header = HeaderDecodeResult {
                    implicit_header: true,
                    raw_symbols: Vec::new(),
                    fcs_ok: true,
                    payload_length: self.params.implicit_payload_length as i32,
                    has_crc: self.params.implicit_has_crc,
                    cr: self.params.implicit_cr as i32,
                    payload_header_bits: Vec::new(),
                };
                let n_sym = self
                    .payload_decoder
                    .compute_payload_symbol_count(&header, self.params.ldro_enabled);
                pending.samples_needed =
                    Some(guard + payload_offset_samples + n_sym as usize * self.sps);
                pending.header = Some(header);
            } else {
                let required = pending.preamble_offset
                    + guard
                    + header_offset_samples
                    + 8 * self.sps;
                if self.capture.len() >= required {
                    let slice = &self.capture[pending.preamble_offset..];
                    match self.header_decoder.decode(slice, &pending.sync)? {
                        Some(h)
                            if h.fcs_ok
                                && (0..=255).contains(&h.payload_length)
                                && (1..=4).contains(&h.cr) =>
                        {
                            let n_sym = self
                                .payload_decoder
                                .compute_payload_symbol_count(&h, self.params.ldro_enabled);
                            pending.samples_needed = Some(
                                guard + payload_offset_samples + n_sym as usize * self.sps,
                            );
                            pending.header = Some(h);
                        }
                        _ => {}
                    }
                }
            }
        }

        if pending.header.is_some() && !pending.header_reported {
            let header = pending.header.as_ref().unwrap();
            self.logger.info(
                Subsystem::Header,
                Some(pending.global_sample_index),
                format!(
                    "payload_length={} cr={} has_crc={}",
                    header.payload_length, header.cr, header.has_crc
                ),
            );
            events.push(FrameEvent::HeaderDecoded {
                global_sample_index: pending.global_sample_index,
                payload_length: header.payload_length,
                has_crc: header.has_crc,
                cr: header.cr,
            });
            pending.header_reported = true;
        }

        if let (Some(header), Some(samples_needed)) =
            (pending.header.clone(), pending.samples_needed)
        {
            if self.capture.len() >= pending.preamble_offset + samples_needed {
                let slice = &self.capture[pending.preamble_offset..];
                let decoded = self.payload_decoder.decode(
                    slice,
                    &pending.sync,
                    &header,
                    self.params.ldro_enabled,
                )?;

                let global_sample_index = pending.global_sample_index;
                let advance = pending.preamble_offset + samples_needed;

                match decoded {
                    Some(p) => {
                        if header.has_crc {
                            if p.crc_ok {
                                self.logger.info(Subsystem::Crc, Some(global_sample_index), "payload CRC ok");
                            } else {
                                self.logger.warn(Subsystem::Crc, Some(global_sample_index), "payload CRC mismatch");
                            }
                        }
                        self.logger.info(
                            Subsystem::Payload,
                            Some(global_sample_index),
                            format!("decoded {} payload bytes", p.bytes.len()),
                        );
                        if self.params.emit_payload_bytes {
                            for (index, &byte) in p.bytes.iter().enumerate() {
                                events.push(FrameEvent::PayloadByte {
                                    global_sample_index,
                                    index,
                                    byte,
                                });
                            }
                        }
                        let mut result = DecodeResult {
                            success: p.crc_ok,
                            frame_synced: true,
                            header_ok: true,
                            payload_crc_ok: p.crc_ok,
                            payload: p.bytes,
                            raw_payload_symbols: p.raw_symbols,
                            p_ofs_est: pending.sync.p_ofs_est,
                            header_payload_length: header.payload_length,
                        };
                        if !header.has_crc {
                            result.payload_crc_ok = true;
                            result.success = true;
                        }
                        events.push(FrameEvent::FrameDone {
                            global_sample_index,
                            result,
                        });
                    }
                    None => {
                        self.logger.error(
                            Subsystem::Payload,
                            Some(global_sample_index),
                            "payload decode failed: uncorrectable or insufficient samples",
                        );
                        events.push(FrameEvent::FrameError { global_sample_index });
                    }
                }

                self.capture.drain(0..advance.min(self.capture.len()));
                self.capture_global_offset += advance;
                self.pending = None;
            }
        }

        Ok(events)
    }

    pub fn reset(&mut self) {
        self.synchronizer.reset();
        self.capture.clear();
        self.capture_global_offset = 0;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_stream_produces_no_events() {
        let params = DecodeParams::new(7, 125_000, 500_000).unwrap();
        let mut receiver = StreamingReceiver::new(params).unwrap();
        let chunk = vec![Complex64::new(0.01, 0.0); 256];
        let events = receiver.push_samples(&chunk).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn reset_clears_capture_and_pending_state() {
        let params = DecodeParams::new(7, 125_000, 500_000).unwrap();
        let mut receiver = StreamingReceiver::new(params).unwrap();
        let chunk = vec![Complex64::new(0.01, 0.0); 256];
        receiver.push_samples(&chunk).unwrap();
        receiver.reset();
        assert!(receiver.capture.is_empty());
        assert_eq!(receiver.capture_global_offset, 0);
    }
}
