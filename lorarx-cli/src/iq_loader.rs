//! Raw complex-float32 IQ file loading (C14), shared by both binaries.

use std::fs;
use std::path::Path;

use lorarx_core::errors::IoError;
use num_complex::Complex64;

/// Load a file of interleaved little-endian f32 I/Q samples with no header.
pub fn load_cf32(path: &Path) -> Result<Vec<Complex64>, IoError> {
    let bytes = fs::read(path).map_err(|source| IoError::Open {
        path: path.display().to_string(),
        source,
    })?;

    if bytes.len() % 8 != 0 {
        return Err(IoError::Unaligned {
            path: path.display().to_string(),
        });
    }

    let samples = bytes
        .chunks_exact(8)
        .map(|chunk| {
            let i = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let q = f32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
            Complex64::new(i as f64, q as f64)
        })
        .collect();

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn scratch_path(name: &str) -> std::path::PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("lorarx-iq-loader-{}-{}-{}", std::process::id(), n, name))
    }

    #[test]
    fn rejects_unaligned_file_size() {
        let path = scratch_path("unaligned");
        fs::write(&path, [0u8; 7]).unwrap();
        assert!(matches!(load_cf32(&path), Err(IoError::Unaligned { .. })));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn parses_interleaved_samples() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        bytes.extend_from_slice(&0.0f32.to_le_bytes());
        bytes.extend_from_slice(&0.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-0.5f32).to_le_bytes());

        let path = scratch_path("aligned");
        fs::write(&path, &bytes).unwrap();
        let samples = load_cf32(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], Complex64::new(1.0, 0.0));
        assert_eq!(samples[1], Complex64::new(0.5, -0.5));
    }
}
