//! Decode parameters and the constants derived from them.

use serde::{Deserialize, Serialize};

use crate::errors::ParamError;

/// Immutable configuration for a single receiver instance.
///
/// Construction validates every field; a `DecodeParams` in the wild is
/// always internally consistent (`sample_rate_hz` divides evenly by
/// `bandwidth_hz`, `sf` is in range, implicit-header fields are only
/// meaningful when `implicit_header` is set).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeParams {
    pub sf: u32,
    pub bandwidth_hz: u32,
    pub sample_rate_hz: u32,
    #[serde(default)]
    pub ldro_enabled: bool,
    #[serde(default = "default_sync_word")]
    pub sync_word: u8,
    #[serde(default)]
    pub skip_sync_word_check: bool,
    #[serde(default)]
    pub implicit_header: bool,
    #[serde(default)]
    pub implicit_payload_length: u32,
    #[serde(default = "default_true")]
    pub implicit_has_crc: bool,
    #[serde(default = "default_cr")]
    pub implicit_cr: u32,
    #[serde(default)]
    pub emit_payload_bytes: bool,
}

fn default_sync_word() -> u8 {
    0x12
}
fn default_true() -> bool {
    true
}
fn default_cr() -> u32 {
    1
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            sf: 7,
            bandwidth_hz: 125_000,
            sample_rate_hz: 500_000,
            ldro_enabled: false,
            sync_word: default_sync_word(),
            skip_sync_word_check: false,
            implicit_header: false,
            implicit_payload_length: 0,
            implicit_has_crc: default_true(),
            implicit_cr: default_cr(),
            emit_payload_bytes: false,
        }
    }
}

impl DecodeParams {
    pub fn new(
        sf: u32,
        bandwidth_hz: u32,
        sample_rate_hz: u32,
    ) -> std::result::Result<Self, ParamError> {
        let params = Self {
            sf,
            bandwidth_hz,
            sample_rate_hz,
            ..Default::default()
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> std::result::Result<(), ParamError> {
        if !(5..=12).contains(&self.sf) {
            return Err(ParamError::SpreadingFactorOutOfRange { sf: self.sf as i32 });
        }
        if self.bandwidth_hz == 0 {
            return Err(ParamError::InvalidBandwidth {
                bandwidth_hz: self.bandwidth_hz as i64,
            });
        }
        if self.sample_rate_hz == 0 {
            return Err(ParamError::InvalidSampleRate {
                sample_rate_hz: self.sample_rate_hz as i64,
            });
        }
        if self.sample_rate_hz % self.bandwidth_hz != 0 {
            return Err(ParamError::NonIntegerOversampling {
                sample_rate_hz: self.sample_rate_hz as i64,
                bandwidth_hz: self.bandwidth_hz as i64,
            });
        }
        if self.implicit_header {
            if !(1..=255).contains(&self.implicit_payload_length) {
                return Err(ParamError::ImplicitPayloadLengthOutOfRange {
                    payload_length: self.implicit_payload_length as i32,
                });
            }
            if !(1..=4).contains(&self.implicit_cr) {
                return Err(ParamError::ImplicitCodingRateOutOfRange {
                    cr: self.implicit_cr as i32,
                });
            }
        }
        Ok(())
    }

    /// Oversampling factor `Fs/BW`.
    pub fn os(&self) -> u32 {
        self.sample_rate_hz / self.bandwidth_hz
    }

    /// Chips per symbol `2^sf`.
    pub fn chips_per_symbol(&self) -> u32 {
        1u32 << self.sf
    }

    /// Samples per symbol `K * os`.
    pub fn samples_per_symbol(&self) -> usize {
        (self.chips_per_symbol() as usize) * (self.os() as usize)
    }

    /// Front-end rise padding: `ceil(50us * Fs)`.
    pub fn rise_samples(&self) -> usize {
        ((50e-6 * self.sample_rate_hz as f64).ceil()) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_constants_match_spec() {
        let params = DecodeParams::new(7, 125_000, 500_000).unwrap();
        assert_eq!(params.os(), 4);
        assert_eq!(params.chips_per_symbol(), 128);
        assert_eq!(params.samples_per_symbol(), 512);
    }

    #[test]
    fn rejects_out_of_range_sf() {
        assert!(DecodeParams::new(4, 125_000, 500_000).is_err());
        assert!(DecodeParams::new(13, 125_000, 500_000).is_err());
    }

    #[test]
    fn rejects_non_integer_oversampling() {
        assert!(DecodeParams::new(7, 125_000, 300_000).is_err());
    }

    #[test]
    fn implicit_header_requires_valid_length_and_cr() {
        let mut params = DecodeParams {
            implicit_header: true,
            ..DecodeParams::new(7, 125_000, 500_000).unwrap()
        };
        assert!(params.validate().is_err());
        params.implicit_payload_length = 11;
        assert!(params.validate().is_err());
        params.implicit_cr = 1;
        assert!(params.validate().is_ok());
    }
}
