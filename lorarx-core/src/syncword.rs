//! Sync-word validator (C5): demodulates the preamble's 8 reference symbols
//! plus the 2 sync-word symbols and checks them against the expected nibbles.

use num_complex::Complex64;
use std::f64::consts::PI;

use crate::chirp::ChirpTable;
use crate::config::DecodeParams;
use crate::fft::transform_pow2;

const PREAMBLE_SYM_COUNT: usize = 8;
const SYNC_SYM_COUNT: usize = 2;
const TOLERANCE: i64 = 2;

/// Result of validating the preamble and sync-word symbols.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncWordDetection {
    pub preamble_offset: usize,
    /// Normalized bins: 8 preamble symbols followed by 2 sync symbols.
    pub symbol_bins: Vec<i64>,
    pub magnitudes: Vec<f64>,
    pub preamble_ok: bool,
    pub sync_ok: bool,
}

#[derive(Debug)]
pub struct SyncWordValidator {
    sf: i32,
    sample_rate_hz: f64,
    os_factor: usize,
    sps: usize,
    downchirp: Vec<Complex64>,
    sync_word: u8,
}

impl SyncWordValidator {
    pub fn new(params: &DecodeParams) -> Self {
        let table = ChirpTable::new(params);
        Self {
            sf: params.sf as i32,
            sample_rate_hz: params.sample_rate_hz as f64,
            os_factor: params.os() as usize,
            sps: params.samples_per_symbol(),
            downchirp: table.downchirp,
            sync_word: params.sync_word,
        }
    }

    /// Demodulate one symbol: CFO-rotate, dechirp, fold `os` samples per
    /// chip, inverse-FFT, and align the argmax bin (`pos − 1 mod K`). `None`
    /// if the window would start before the buffer.
    fn demod_symbol(
        &self,
        samples: &[Complex64],
        sym_index: usize,
        preamble_offset: isize,
        cfo_hz: f64,
    ) -> Option<(i64, f64)> {
        let start_signed = preamble_offset + (sym_index * self.sps) as isize;
        if start_signed < 0 {
            return None;
        }
        let start = start_signed as usize;
        let ts = 1.0 / self.sample_rate_hz;

        let mut folded = vec![Complex64::new(0.0, 0.0); self.sps];
        for i in 0..self.sps {
            let angle = -2.0 * PI * cfo_hz * ts * i as f64;
            let rot = Complex64::from_polar(1.0, angle);
            folded[i] = samples[start + i] * self.downchirp[i] * rot;
        }

        let chips = 1usize << self.sf;
        let mut dec = vec![Complex64::new(0.0, 0.0); chips];
        for chip in 0..chips {
            let base = chip * self.os_factor;
            let mut acc = Complex64::new(0.0, 0.0);
            for j in 0..self.os_factor {
                acc += folded[base + j];
            }
            dec[chip] = acc;
        }

        transform_pow2(&mut dec, true).ok()?;
        let mut best_k = 0usize;
        let mut best_mag = 0.0f64;
        for (k, c) in dec.iter().enumerate() {
            let mag = c.norm();
            if mag > best_mag {
                best_mag = mag;
                best_k = k;
            }
        }
        let k_aligned = (best_k + chips - 1) % chips;
        Some((k_aligned as i64, best_mag))
    }

    fn circular_distance(a: i64, b: i64, modulus: i64) -> i64 {
        let d = (a - b).abs();
        d.min(modulus - d)
    }

    /// Validate the preamble and sync symbols starting at `preamble_offset`,
    /// given a CFO estimate. `None` when `preamble_offset < 0` or there
    /// aren't enough samples for all 10 symbols.
    pub fn analyze(
        &self,
        samples: &[Complex64],
        preamble_offset: isize,
        cfo_hz: f64,
    ) -> Option<SyncWordDetection> {
        if preamble_offset < 0 {
            return None;
        }
        let needed = preamble_offset as usize + (PREAMBLE_SYM_COUNT + SYNC_SYM_COUNT) * self.sps;
        if samples.len() < needed {
            return None;
        }

        let chips = 1usize << self.sf;
        let chips_i = chips as i64;

        let mut pre_bins = Vec::with_capacity(PREAMBLE_SYM_COUNT);
        let mut magnitudes = Vec::with_capacity(PREAMBLE_SYM_COUNT + SYNC_SYM_COUNT);
        for sym in 0..PREAMBLE_SYM_COUNT {
            let (bin, mag) = self.demod_symbol(samples, sym, preamble_offset, cfo_hz)?;
            pre_bins.push(bin);
            magnitudes.push(mag);
        }

        // Mode of the preamble bins, used to normalize the constant offset.
        let mut offset_est = 0i64;
        let mut best_count = 0usize;
        for &val in &pre_bins {
            let count = pre_bins.iter().filter(|&&b| b == val).count();
            if count > best_count {
                best_count = count;
                offset_est = val;
            }
        }

        let mut symbol_bins = Vec::with_capacity(PREAMBLE_SYM_COUNT + SYNC_SYM_COUNT);
        let mut preamble_ok = true;
        for &bin in &pre_bins {
            let norm = (bin + chips_i - offset_est).rem_euclid(chips_i);
            let dist0 = norm.min(chips_i - norm);
            if dist0 > TOLERANCE {
                preamble_ok = false;
            }
            symbol_bins.push(norm);
        }

        let nibble_hi = (((self.sync_word >> 4) & 0xF) as i64) << 3;
        let nibble_lo = ((self.sync_word & 0xF) as i64) << 3;
        let expected = [nibble_hi, nibble_lo];

        let mut sync_ok = true;
        for (idx, &exp_bin) in expected.iter().enumerate() {
            let sym_index = PREAMBLE_SYM_COUNT + idx;
            let (raw_bin, mag) = self.demod_symbol(samples, sym_index, preamble_offset, cfo_hz)?;
            magnitudes.push(mag);
            let bin = (raw_bin + chips_i - offset_est).rem_euclid(chips_i);
            let comp = (chips_i - bin).rem_euclid(chips_i);
            let exp_bin = exp_bin % chips_i;

            let d_bin = Self::circular_distance(bin, exp_bin, chips_i);
            let d_comp = Self::circular_distance(comp, exp_bin, chips_i);
            let chosen = if d_comp < d_bin { comp } else { bin };
            symbol_bins.push(chosen);

            let dist = Self::circular_distance(chosen, exp_bin, chips_i);
            if dist > TOLERANCE {
                sync_ok = false;
            }
        }

        Some(SyncWordDetection {
            preamble_offset: preamble_offset as usize,
            symbol_bins,
            magnitudes,
            preamble_ok,
            sync_ok,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_preamble_offset() {
        let params = DecodeParams::new(7, 125_000, 500_000).unwrap();
        let validator = SyncWordValidator::new(&params);
        let samples = vec![Complex64::new(0.0, 0.0); params.samples_per_symbol() * 10];
        assert!(validator.analyze(&samples, -1, 0.0).is_none());
    }

    #[test]
    fn rejects_insufficient_samples() {
        let params = DecodeParams::new(7, 125_000, 500_000).unwrap();
        let validator = SyncWordValidator::new(&params);
        let samples = vec![Complex64::new(0.0, 0.0); params.samples_per_symbol() * 5];
        assert!(validator.analyze(&samples, 0, 0.0).is_none());
    }
}
