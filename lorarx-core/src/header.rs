//! Explicit header decoder (C6).

use num_complex::Complex64;
use std::f64::consts::PI;

use crate::bits::bits_to_uint_le;
use crate::chirp::ChirpTable;
use crate::config::DecodeParams;
use crate::errors::HeaderError;
use crate::fft::{argmax, fft_magnitudes};
use crate::sync::FrameSyncResult;
use crate::tables::{gray_decode_table, header_crc5};

const HEADER_SYM_COUNT: usize = 8;

/// Decoded explicit-header fields, plus any bits available to seed the
/// payload dewhitening prefix (rows 5.. when `sf` leaves extra capacity).
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderDecodeResult {
    pub implicit_header: bool,
    pub raw_symbols: Vec<i64>,
    pub fcs_ok: bool,
    pub payload_length: i32,
    pub has_crc: bool,
    pub cr: i32,
    pub payload_header_bits: Vec<u8>,
}

#[derive(Debug)]
pub struct HeaderDecoder {
    sf: i32,
    sample_rate_hz: f64,
    os_factor: usize,
    sps: usize,
    downchirp: Vec<Complex64>,
}

impl HeaderDecoder {
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

    /// Samples from preamble start to the first header symbol:
    /// `Nrise + 12*sps + sps/4`.
    pub fn header_offset_samples(&self) -> usize {
        let nrise = (50e-6 * self.sample_rate_hz).ceil() as usize;
        nrise + 12 * self.sps + self.sps / 4
    }

    pub fn symbol_span_samples(&self) -> usize {
        HEADER_SYM_COUNT * self.sps
    }

    /// Demodulate the 8 header symbols and decode the explicit header.
    /// `None` when the buffer doesn't reach the header window.
    pub fn decode(
        &self,
        samples: &[Complex64],
        sync: &FrameSyncResult,
    ) -> Result<Option<HeaderDecodeResult>, HeaderError> {
        let n = self.sps;
        let k = 1usize << self.sf;
        let ts = 1.0 / self.sample_rate_hz;
        let header_offset = self.header_offset_samples();

        let base = sync.p_ofs_est + header_offset as isize;
        if base < 0 || base as usize + HEADER_SYM_COUNT * n > samples.len() {
            return Ok(None);
        }

        let mut raw_symbols = Vec::with_capacity(HEADER_SYM_COUNT);
        let mut ofs = header_offset as isize;
        for _ in 0..HEADER_SYM_COUNT {
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
            for chip in 0..k {
                let mut idx = 1 + chip * self.os_factor;
                if idx >= n - 1 {
                    idx = n - 2;
                }
                dec.push(temp[idx]);
            }

            let spec = fft_magnitudes(&dec, true).map_err(|_| HeaderError::PpmTooSmall { ppm: 0 })?;
            let pos = argmax(&spec) as i64;
            let k_val = (pos - 1).rem_euclid(k as i64);
            raw_symbols.push(k_val);
            ofs += n as isize;
        }

        let ppm = (self.sf - 2).max(1) as u32;
        if ppm < 5 {
            return Err(HeaderError::PpmTooSmall { ppm: ppm as usize });
        }

        let degray = gray_decode_table(ppm);
        let k_minus_1 = (k - 1) as f64;
        let mask = (1u32 << ppm) - 1;

        let mut bits_est = vec![0u8; ppm as usize * HEADER_SYM_COUNT];
        for (sym, &raw) in raw_symbols.iter().enumerate() {
            let bin_d = ((k_minus_1 - raw as f64) / 4.0).round();
            let modulus = 1i64 << ppm;
            let bin = ((bin_d as i64 % modulus) + modulus) % modulus;
            let decoded = degray[(bin as u32 & mask) as usize];
            for bit in 0..ppm {
                let bit_val = ((decoded >> (ppm - 1 - bit)) & 1) as u8;
                bits_est[sym * ppm as usize + bit as usize] = bit_val;
            }
        }

        // S[col][row], column-major per spec.
        let ppm_usize = ppm as usize;
        let mut s = vec![vec![0u8; ppm_usize]; HEADER_SYM_COUNT];
        for col in 0..HEADER_SYM_COUNT {
            for row in 0..ppm_usize {
                s[col][row] = bits_est[row + col * ppm_usize];
            }
        }

        let cw_cols = 4 + 4; // CR_hdr = 4
        let mut c = vec![vec![0u8; cw_cols]; ppm_usize];
        for ii in 0..ppm_usize {
            for jj in 0..cw_cols {
                c[ii][jj] = s[jj][(ii + jj) % ppm_usize];
            }
        }

        let mut c_flip = vec![vec![0u8; cw_cols]; ppm_usize];
        for row in 0..ppm_usize {
            c_flip[row] = c[ppm_usize - 1 - row].clone();
        }

        let mut rows = Vec::with_capacity(ppm_usize);
        for (row_idx, codeword) in c_flip.iter().enumerate() {
            let decoded = crate::tables::hamming_decode(codeword, 4)
                .ok_or(HeaderError::Uncorrectable { row: row_idx })?;
            rows.push(decoded);
        }

        // Length from rows {1,0}: little-endian packing of 4+4 bits.
        let mut len_bits = rows[1].to_vec();
        len_bits.extend_from_slice(&rows[0]);
        let length = (bits_to_uint_le(&len_bits) & 0xFF) as i32;

        let n0 = (bits_to_uint_le(&rows[0]) & 0xF) as u8;
        let n1 = (bits_to_uint_le(&rows[1]) & 0xF) as u8;
        let n2 = (bits_to_uint_le(&rows[2]) & 0xF) as u8;

        let mut fcs_bits = rows[4].to_vec();
        fcs_bits.extend_from_slice(&rows[3]);
        let fcs_hdr = (bits_to_uint_le(&fcs_bits) & 0xFF) as u8;
        let chk_rx = fcs_hdr & 0x1F;
        let chk_calc = header_crc5(n0, n1, n2) & 0x1F;
        let fcs_ok = chk_rx == chk_calc;

        let mut result = HeaderDecodeResult {
            implicit_header: false,
            raw_symbols,
            fcs_ok,
            payload_length: 0,
            has_crc: false,
            cr: 0,
            payload_header_bits: Vec::new(),
        };

        if fcs_ok {
            result.payload_length = length;
            result.has_crc = (n2 & 0x1) != 0;
            result.cr = ((n2 >> 1) & 0x7) as i32;

            let n_bits_hdr = (ppm_usize * 4).saturating_sub(20);
            if n_bits_hdr > 0 {
                let mut extra = Vec::with_capacity(n_bits_hdr);
                'outer: for row in c_flip.iter().take(ppm_usize).skip(5) {
                    for &bit in row.iter().take(4) {
                        if extra.len() >= n_bits_hdr {
                            break 'outer;
                        }
                        extra.push(bit);
                    }
                }
                result.payload_header_bits = extra;
            }
        }

        Ok(Some(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_insufficient_samples() {
        let params = DecodeParams::new(7, 125_000, 500_000).unwrap();
        let decoder = HeaderDecoder::new(&params);
        let sync = FrameSyncResult {
            preamble_offset: 0,
            p_ofs_est: 0,
            cfo_hz: 0.0,
        };
        let samples = vec![Complex64::new(0.0, 0.0); 8];
        assert!(decoder.decode(&samples, &sync).unwrap().is_none());
    }

    #[test]
    fn num_to_bits_msb_matches_expected_width() {
        assert_eq!(crate::bits::num_to_bits_msb(0b101, 3), vec![1, 0, 1]);
    }
}
