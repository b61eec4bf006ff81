//! Reference up/down chirp generation (C1).

use num_complex::Complex64;
use std::f64::consts::PI;

use crate::config::DecodeParams;

/// A cached pair of reference chirps for one `(sf, bw, fs)` combination.
///
/// Built once per [`DecodeParams`] instance and shared read-only across
/// every symbol demodulated by that instance.
#[derive(Debug, Clone)]
pub struct ChirpTable {
    pub upchirp: Vec<Complex64>,
    pub downchirp: Vec<Complex64>,
}

impl ChirpTable {
    pub fn new(params: &DecodeParams) -> Self {
        let sps = params.samples_per_symbol();
        let k = params.chips_per_symbol() as f64;
        let bw = params.bandwidth_hz as f64;
        let fs = params.sample_rate_hz as f64;
        let symbol_period = k / bw;

        let mut upchirp = Vec::with_capacity(sps);
        let mut downchirp = Vec::with_capacity(sps);
        for n in 0..sps {
            let t = n as f64 / fs;
            let phase = 2.0 * PI * (-bw / 2.0) * t + PI * (bw / symbol_period) * t * t;
            upchirp.push(Complex64::from_polar(1.0, phase));
            downchirp.push(Complex64::from_polar(1.0, -phase));
        }

        Self { upchirp, downchirp }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chirps_have_expected_length_and_unit_magnitude() {
        let params = DecodeParams::new(7, 125_000, 500_000).unwrap();
        let table = ChirpTable::new(&params);
        let sps = params.samples_per_symbol();
        assert_eq!(table.upchirp.len(), sps);
        assert_eq!(table.downchirp.len(), sps);
        for sample in table.upchirp.iter().chain(table.downchirp.iter()) {
            assert!((sample.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn downchirp_is_conjugate_of_upchirp() {
        let params = DecodeParams::new(7, 125_000, 500_000).unwrap();
        let table = ChirpTable::new(&params);
        for (u, d) in table.upchirp.iter().zip(table.downchirp.iter()) {
            assert!((u.conj() - d).norm() < 1e-9);
        }
    }
}
