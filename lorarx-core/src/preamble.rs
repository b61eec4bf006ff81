//! Matched-filter preamble detector (C3).

use num_complex::Complex64;

use crate::chirp::ChirpTable;
use crate::config::DecodeParams;

/// Correlation offset and normalized magnitude of the best preamble match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreambleDetection {
    pub offset: usize,
    pub metric: f64,
}

/// Matched filter against a cached reference upchirp.
pub struct PreambleDetector {
    sps: usize,
    upchirp: Vec<Complex64>,
}

impl PreambleDetector {
    pub fn new(params: &DecodeParams) -> Self {
        let table = ChirpTable::new(params);
        Self {
            sps: params.samples_per_symbol(),
            upchirp: table.upchirp,
        }
    }

    fn correlate(&self, samples: &[Complex64], pos: usize) -> f64 {
        let mut acc = Complex64::new(0.0, 0.0);
        for i in 0..self.sps {
            acc += self.upchirp[i].conj() * samples[pos + i];
        }
        acc.norm() / self.sps as f64
    }

    /// Two-pass matched-filter search: a coarse stride-`sps/4` sweep followed
    /// by a fine stride-1 refinement around the coarse winner. Absent only
    /// when fewer than `sps` samples are supplied.
    pub fn detect(&self, samples: &[Complex64]) -> Option<PreambleDetection> {
        if samples.len() < self.sps {
            return None;
        }

        let step = (self.sps / 4).max(1);
        let mut coarse_best_offset = 0usize;
        let mut coarse_best_metric = -1.0f64;

        let mut pos = 0usize;
        while pos + self.sps <= samples.len() {
            let metric = self.correlate(samples, pos);
            if metric > coarse_best_metric + 1e-9 {
                coarse_best_metric = metric;
                coarse_best_offset = pos;
            }
            pos += step;
        }

        let refine_radius = step;
        let start = coarse_best_offset.saturating_sub(refine_radius);
        let end = (samples.len() - self.sps).min(coarse_best_offset + refine_radius);

        let mut best_offset = coarse_best_offset;
        let mut best_metric = coarse_best_metric;

        for pos in start..=end {
            let metric = self.correlate(samples, pos);
            if metric > best_metric + 1e-9
                || ((metric - best_metric).abs() <= 1e-9 && pos < best_offset)
            {
                best_metric = metric;
                best_offset = pos;
            }
        }

        Some(PreambleDetection {
            offset: best_offset,
            metric: best_metric,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_buffers_shorter_than_one_symbol() {
        let params = DecodeParams::new(7, 125_000, 500_000).unwrap();
        let detector = PreambleDetector::new(&params);
        let samples = vec![Complex64::new(0.0, 0.0); params.samples_per_symbol() - 1];
        assert!(detector.detect(&samples).is_none());
    }

    #[test]
    fn finds_exact_upchirp_at_known_offset() {
        let params = DecodeParams::new(7, 125_000, 500_000).unwrap();
        let table = ChirpTable::new(&params);
        let detector = PreambleDetector::new(&params);
        let sps = params.samples_per_symbol();

        let lead_in = sps / 3;
        let mut samples = vec![Complex64::new(0.0, 0.0); lead_in];
        samples.extend_from_slice(&table.upchirp);
        samples.extend(vec![Complex64::new(0.0, 0.0); sps]);

        let detection = detector.detect(&samples).unwrap();
        assert_eq!(detection.offset, lead_in);
        assert!(detection.metric > 0.9);
    }
}
