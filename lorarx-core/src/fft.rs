//! Power-of-two FFT wrapper (C2), built on `rustfft`.
//!
//! `rustfft` shares the no-implicit-scaling convention this receiver relies
//! on: forward and inverse transforms are unnormalized, so callers that need
//! a unitary transform must scale explicitly by `1/N`.

use num_complex::Complex64;
use rustfft::{num_complex::Complex as RustComplex, FftPlanner};

use crate::errors::ParamError;

fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}

/// In-place forward or inverse FFT over a power-of-two length buffer.
///
/// `N = 0` is a no-op; any other non-power-of-two length is rejected.
pub fn transform_pow2(data: &mut [Complex64], inverse: bool) -> Result<(), ParamError> {
    let n = data.len();
    if n == 0 {
        return Ok(());
    }
    if !is_power_of_two(n) {
        return Err(ParamError::NonPowerOfTwoLength { size: n });
    }

    let mut planner = FftPlanner::new();
    let fft = if inverse {
        planner.plan_fft_inverse(n)
    } else {
        planner.plan_fft_forward(n)
    };

    let mut buffer: Vec<RustComplex<f64>> =
        data.iter().map(|c| RustComplex::new(c.re, c.im)).collect();
    fft.process(&mut buffer);
    for (dst, src) in data.iter_mut().zip(buffer.into_iter()) {
        *dst = Complex64::new(src.re, src.im);
    }
    Ok(())
}

/// Magnitude spectrum of an in-place forward FFT of `data`. Does not mutate
/// `data`; used by the argmax-bin hot path in preamble/sync/header/payload
/// demodulation so callers never need a scratch buffer of their own.
pub fn fft_magnitudes(data: &[Complex64], inverse: bool) -> Result<Vec<f64>, ParamError> {
    let mut buffer = data.to_vec();
    transform_pow2(&mut buffer, inverse)?;
    Ok(buffer.iter().map(|c| c.norm()).collect())
}

/// Index of the largest-magnitude bin. Ties resolve to the earliest index,
/// matching `std::max_element`'s first-wins behavior in the reference
/// implementation.
pub fn argmax(magnitudes: &[f64]) -> usize {
    let mut best = 0;
    let mut best_val = f64::MIN;
    for (i, &v) in magnitudes.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_then_inverse_recovers_input_scaled_by_n() {
        let n = 64;
        let original: Vec<Complex64> = (0..n)
            .map(|i| Complex64::new((i as f64 * 0.37).sin(), (i as f64 * 0.11).cos()))
            .collect();
        let mut buffer = original.clone();
        transform_pow2(&mut buffer, false).unwrap();
        transform_pow2(&mut buffer, true).unwrap();
        for (a, b) in original.iter().zip(buffer.iter()) {
            assert!((a * n as f64 - b).norm() < 1e-6);
        }
    }

    #[test]
    fn rejects_non_power_of_two() {
        let mut buffer = vec![Complex64::new(0.0, 0.0); 6];
        assert!(transform_pow2(&mut buffer, false).is_err());
    }

    #[test]
    fn zero_length_is_a_no_op() {
        let mut buffer: Vec<Complex64> = Vec::new();
        assert!(transform_pow2(&mut buffer, false).is_ok());
    }

    #[test]
    fn argmax_prefers_earliest_on_tie() {
        assert_eq!(argmax(&[1.0, 2.0, 2.0, 0.5]), 1);
    }
}
