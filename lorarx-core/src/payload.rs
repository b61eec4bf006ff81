//! Payload decoder (C7).

use num_complex::Complex64;
use std::f64::consts::PI;

use crate::bits::byte_from_bits_le;
use crate::chirp::ChirpTable;
use crate::config::DecodeParams;
use crate::errors::PayloadError;
use crate::fft::{argmax, fft_magnitudes};
use crate::header::HeaderDecodeResult;
use crate::sync::FrameSyncResult;
use crate::tables::{gray_decode_table, payload_crc16, whiten_bits};

const IMPLICIT_FAKE_HEADER_BITS: [u8; 20] =
    [1, 1, 1, 0, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1, 0, 1, 0, 0, 0, 0];

/// Decoded payload: the message bytes, raw symbol bins (for diagnostics),
/// and whether the CRC-16 check passed (meaningless when `has_crc` is false;
/// callers should consult the header for that).
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadDecodeResult {
    pub raw_symbols: Vec<i64>,
    pub bytes: Vec<u8>,
    pub crc_ok: bool,
}

#[derive(Debug)]
pub struct PayloadDecoder {
    sf: i32,
    sample_rate_hz: f64,
    os_factor: usize,
    sps: usize,
    downchirp: Vec<Complex64>,
}

impl PayloadDecoder {
    pub fn new(params: &DecodeParams) -> Self {
        let table = ChirpTable::new(params);
        Self {
            sf: params.sf as i32,
            sample_rate_hz: params.sample_rate_hz as f64,
            os_factor: params.os() as usize,
            sps: params.samples_per_symbol(),
            downchirp: table.downchirp,
        }
    }

    /// Samples from preamble start to the first payload symbol. Identical
    /// for explicit and implicit header modes: `Nrise + 12*sps + sps/4 + 8*sps`.
    pub fn payload_offset_samples(&self) -> usize {
        let nrise = (50e-6 * self.sample_rate_hz).ceil() as usize;
        nrise + 12 * self.sps + self.sps / 4 + 8 * self.sps
    }

    /// Number of payload symbols for the given header fields and LDRO
    /// setting, per the explicit/implicit formulas in spec §4.7.
    pub fn compute_payload_symbol_count(&self, header: &HeaderDecodeResult, ldro_enabled: bool) -> i32 {
        let sf = self.sf;
        let de = if ldro_enabled || sf >= 11 { 1 } else { 0 };
        let cr = header.cr.clamp(1, 4);
        let crc = i32::from(header.has_crc);
        let payload_len = header.payload_length.max(0);

        if header.implicit_header {
            let ppm = sf - 2 * de;
            let n_bits_blk = ppm * 4;
            let n_bits_tot = 8 * payload_len + 16 * crc;
            let n_bits_hdr = 20;
            let n_blk_tot = (n_bits_tot - n_bits_hdr + n_bits_blk - 1) / n_bits_blk;
            let sym_per_block = 4 + cr;
            sym_per_block * n_blk_tot.max(0)
        } else {
            let denom = (4 * (sf - 2 * de)).max(1);
            let numerator = (8 * payload_len - 4 * sf + 28 + 16 * crc).max(0);
            let ceil_term = (numerator + denom - 1) / denom;
            let sym_per_block = 4 + cr;
            sym_per_block * ceil_term.max(0)
        }
    }

    /// Demodulate and decode the payload following a valid header.
    pub fn decode(
        &self,
        samples: &[Complex64],
        sync: &FrameSyncResult,
        header: &HeaderDecodeResult,
        ldro_enabled: bool,
    ) -> Result<Option<PayloadDecodeResult>, PayloadError> {
        if !header.fcs_ok || header.payload_length <= 0 {
            return Ok(None);
        }
        let cr = header.cr.clamp(1, 4);
        let n = self.sps;
        let symbol_offset = self.payload_offset_samples();
        let ts = 1.0 / self.sample_rate_hz;

        let n_payload_syms = self.compute_payload_symbol_count(header, ldro_enabled);
        if n_payload_syms <= 0 {
            return Err(PayloadError::InvalidSymbolCount);
        }

        let k = 1usize << self.sf;
        let mut raw_symbols = Vec::with_capacity(n_payload_syms as usize);
        let mut ofs = symbol_offset as isize;

        for _ in 0..n_payload_syms {
            let mut temp = vec![Complex64::new(0.0, 0.0); n];
            for (i, slot) in temp.iter_mut().enumerate() {
                let idx_signed = sync.p_ofs_est + ofs + i as isize;
                if idx_signed < 0 || idx_signed as usize >= samples.len() {
                    return Ok(None);
                }
                let angle = -2.0 * PI * sync.cfo_hz * ts * (ofs + i as isize) as f64;
                let rot = Complex64::from_polar(1.0, angle);
                *slot = samples[idx_signed as usize] * self.downchirp[i] * rot;
            }

            let mut dec = Vec::with_capacity(k);
            let mut idx = 0;
            while idx < n {
                dec.push(temp[idx]);
                idx += self.os_factor;
            }
            if dec.len() != k {
                return Ok(None);
            }

            let spec = match fft_magnitudes(&dec, true) {
                Ok(s) => s,
                Err(_) => return Ok(None),
            };
            let pos = argmax(&spec) as i64;
            let k_val = (pos - 1).rem_euclid(k as i64);
            raw_symbols.push(k_val);
            ofs += n as isize;
        }

        let de = if self.sf > 10 || ldro_enabled { 1 } else { 0 };
        let ppm = (self.sf - 2 * de) as u32;
        let ppm_usize = ppm as usize;
        let n_sym_blk = (4 + cr) as usize;
        let n_blk_tot = raw_symbols.len() / n_sym_blk;
        let n_bits_blk = ppm_usize * 4;
        let pow_scale = 2f64.powi(2 * de);

        let mut payload_bits: Vec<u8> = if header.implicit_header {
            IMPLICIT_FAKE_HEADER_BITS.to_vec()
        } else {
            header.payload_header_bits.clone()
        };

        let degray = gray_decode_table(ppm);
        let mut payload_ofs = payload_bits.len();
        payload_bits.resize(payload_bits.len() + n_blk_tot * n_bits_blk, 0);

        for blk in 0..n_blk_tot {
            let mut bits_blk = vec![0u8; ppm_usize * n_sym_blk];
            for sym in 0..n_sym_blk {
                let idx = blk * n_sym_blk + sym;
                let k_val = raw_symbols[idx] as f64;
                let numerator = k as f64 - 2.0 - k_val;
                let bin = wrap_mod_i64((numerator / pow_scale).round() as i64, 1i64 << ppm);
                let decoded = degray[bin as usize];
                for bit in 0..ppm_usize {
                    bits_blk[sym * ppm_usize + bit] =
                        ((decoded >> (ppm_usize - 1 - bit)) & 1) as u8;
                }
            }

            let mut s = vec![vec![0u8; ppm_usize]; n_sym_blk];
            for row in 0..n_sym_blk {
                for col in 0..ppm_usize {
                    s[row][col] = bits_blk[row * ppm_usize + col];
                }
            }

            let mut c = vec![vec![0u8; n_sym_blk]; ppm_usize];
            for ii in 0..ppm_usize {
                for jj in 0..n_sym_blk {
                    let src_col = (ii + jj) % ppm_usize;
                    c[ii][jj] = s[jj][src_col];
                }
            }
            for row in 0..ppm_usize / 2 {
                c.swap(row, ppm_usize - 1 - row);
            }

            for row in c.iter() {
                for &bit in row.iter().take(4) {
                    if payload_ofs >= payload_bits.len() {
                        return Ok(None);
                    }
                    payload_bits[payload_ofs] = bit;
                    payload_ofs += 1;
                }
            }
        }

        let payload_bits = whiten_bits(&payload_bits);

        let mut total_bits = payload_bits.len();
        let mut payload_bits = payload_bits;
        if total_bits % 8 != 0 {
            let padded = total_bits.div_ceil(8) * 8;
            payload_bits.resize(padded, 0);
            total_bits = padded;
        }
        let total_bytes = total_bits / 8;
        let payload_length = header.payload_length as usize;
        if total_bytes < payload_length {
            return Ok(None);
        }

        let bytes: Vec<u8> = (0..total_bytes)
            .map(|i| byte_from_bits_le(&payload_bits, i * 8))
            .collect();

        let message = bytes[..payload_length].to_vec();
        let mut crc_ok = true;
        if header.has_crc {
            let message_bit_count = payload_length * 8;
            if payload_bits.len() < message_bit_count + 16 {
                crc_ok = false;
            } else {
                match payload_crc16(&payload_bits, message_bit_count) {
                    Some(calc) => {
                        let observed = &payload_bits[message_bit_count..message_bit_count + 16];
                        crc_ok = observed == calc;
                    }
                    None => {
                        return Err(PayloadError::LengthOutOfCrcRange { payload_length });
                    }
                }
            }
        }

        Ok(Some(PayloadDecodeResult {
            raw_symbols,
            bytes: message,
            crc_ok,
        }))
    }
}

fn wrap_mod_i64(value: i64, modulus: i64) -> i64 {
    let r = value % modulus;
    if r < 0 {
        r + modulus
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_header(payload_length: i32, cr: i32, has_crc: bool, implicit: bool) -> HeaderDecodeResult {
        HeaderDecodeResult {
            implicit_header: implicit,
            raw_symbols: Vec::new(),
            fcs_ok: true,
            payload_length,
            has_crc,
            cr,
            payload_header_bits: Vec::new(),
        }
    }

    #[test]
    fn symbol_count_matches_explicit_formula_sf7_cr1() {
        let params = DecodeParams::new(7, 125_000, 500_000).unwrap();
        let decoder = PayloadDecoder::new(&params);
        let header = dummy_header(11, 1, true, false);
        // numerator = 8*11 - 28 + 28 + 16 = 104, denom = 28, ceil = 4, *5 = 20
        assert_eq!(decoder.compute_payload_symbol_count(&header, false), 20);
    }

    #[test]
    fn returns_none_on_failed_header_preconditions() {
        let params = DecodeParams::new(7, 125_000, 500_000).unwrap();
        let decoder = PayloadDecoder::new(&params);
        let mut header = dummy_header(11, 1, true, false);
        header.fcs_ok = false;
        let sync = FrameSyncResult {
            preamble_offset: 0,
            p_ofs_est: 0,
            cfo_hz: 0.0,
        };
        let samples = vec![Complex64::new(0.0, 0.0); 16];
        assert!(decoder.decode(&samples, &sync, &header, false).unwrap().is_none());
    }

    #[test]
    fn wrap_mod_handles_negative_values() {
        assert_eq!(wrap_mod_i64(-1, 128), 127);
        assert_eq!(wrap_mod_i64(128, 128), 0);
    }
}
