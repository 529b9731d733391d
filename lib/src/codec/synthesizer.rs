//! Inverse transform: magnitude plus unit-circle phase back to a real signal

use super::core::{phase_from_unit_pair, CodecConfig, Reconstruction};
use crate::error::SpectraError;
use crate::Result;
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Relative size of the imaginary residue above which a warning is logged
pub const RESIDUAL_TOLERANCE: f64 = 1e-6;

/// Synthesizer rebuilding N-point real signals from one-sided spectra
pub struct SpectrumSynthesizer {
    config: CodecConfig,
    fft_inverse: Arc<dyn Fft<f64>>,
}

impl SpectrumSynthesizer {
    /// Create a new synthesizer planned for `config.target_length` points
    pub fn new(config: CodecConfig) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft_inverse = planner.plan_fft_inverse(config.target_length);

        Self {
            config,
            fft_inverse,
        }
    }

    /// Rebuild the time signal and report the imaginary residue
    pub fn synthesize(
        &self,
        magnitude: &[f64],
        phase_sin: &[f64],
        phase_cos: &[f64],
    ) -> Result<Reconstruction> {
        let num_bins = self.config.num_bins();
        for (name, len) in [
            ("magnitude", magnitude.len()),
            ("phase_sin", phase_sin.len()),
            ("phase_cos", phase_cos.len()),
        ] {
            if len != num_bins {
                return Err(SpectraError::shape(
                    format!("decoded {} bins", name),
                    num_bins,
                    len,
                ));
            }
        }

        // Phase was only ever stored as (sin, cos)
        let phase = phase_from_unit_pair(phase_sin, phase_cos);
        let one_sided: Vec<Complex64> = magnitude
            .iter()
            .zip(&phase)
            .map(|(&m, &p)| Complex64::from_polar(m, p))
            .collect();

        let mut buffer = hermitian_spectrum(&one_sided, self.config.target_length);
        self.fft_inverse.process(&mut buffer);

        // rustfft doesn't normalize the inverse
        let scale = 1.0 / self.config.target_length as f64;
        let mut signal = Vec::with_capacity(buffer.len());
        let mut max_imaginary: f64 = 0.0;
        let mut peak: f64 = 0.0;
        for value in &buffer {
            let value = *value * scale;
            signal.push(value.re);
            max_imaginary = max_imaginary.max(value.im.abs());
            peak = peak.max(value.re.abs());
        }

        if max_imaginary > RESIDUAL_TOLERANCE * peak.max(1.0) {
            log::warn!(
                "Reconstruction left an imaginary residue of {:.3e} (signal peak {:.3e})",
                max_imaginary,
                peak
            );
        }

        Ok(Reconstruction {
            signal,
            max_imaginary,
        })
    }
}

/// Expand a one-sided spectrum of N/2 bins into the full N-point spectrum
///
/// A fresh buffer is filled in two disjoint ranges:
/// - direct half: bins [0, N/2) copied from `one_sided`
/// - mirrored half: bins [N/2 + 1, N) set to `conj(X[N - k])`
///
/// DC (bin 0) and Nyquist (bin N/2) have no conjugate partner, so neither is
/// written by the mirrored range. Nyquist is not part of the one-sided
/// representation and stays zero.
pub fn hermitian_spectrum(one_sided: &[Complex64], n: usize) -> Vec<Complex64> {
    let half = n / 2;
    let mut full = vec![Complex64::new(0.0, 0.0); n];

    for (k, &bin) in one_sided.iter().take(half).enumerate() {
        full[k] = bin;
    }
    for k in (half + 1)..n {
        full[k] = full[n - k].conj();
    }

    full
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::analyzer::SpectrumAnalyzer;
    use std::f64::consts::PI;

    fn config(n: usize) -> CodecConfig {
        CodecConfig::new(n).unwrap()
    }

    #[test]
    fn test_hermitian_fill_excludes_dc_and_nyquist() {
        let n = 8;
        let one_sided: Vec<Complex64> = (0..n / 2)
            .map(|k| Complex64::new(k as f64 + 1.0, k as f64 * 0.5))
            .collect();

        let full = hermitian_spectrum(&one_sided, n);
        assert_eq!(full.len(), n);
        assert_eq!(full[0], one_sided[0]);
        assert_eq!(full[n / 2], Complex64::new(0.0, 0.0));
        for k in 1..n / 2 {
            assert_eq!(full[k], one_sided[k]);
            assert_eq!(full[n - k], one_sided[k].conj());
        }
    }

    #[test]
    fn test_reconstructs_band_limited_signal() {
        let n = 128;
        let signal: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64 / n as f64;
                1.5 + (2.0 * PI * 3.0 * t).sin() + 0.25 * (2.0 * PI * 17.0 * t + 0.4).cos()
            })
            .collect();

        let spectrum = SpectrumAnalyzer::new(config(n)).analyze(&signal).unwrap();
        let sin: Vec<f64> = spectrum.phase.iter().map(|p| p.sin()).collect();
        let cos: Vec<f64> = spectrum.phase.iter().map(|p| p.cos()).collect();

        let reconstruction = SpectrumSynthesizer::new(config(n))
            .synthesize(&spectrum.magnitude, &sin, &cos)
            .unwrap();

        let max_error = signal
            .iter()
            .zip(&reconstruction.signal)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        println!("Max reconstruction error: {:.3e}", max_error);
        assert!(max_error < 1e-9);
        assert!(reconstruction.max_imaginary < 1e-9);
    }

    #[test]
    fn test_complex_dc_leaves_imaginary_residue() {
        let n = 16;
        let mut magnitude = vec![0.0; n / 2];
        magnitude[0] = 4.0;
        let mut sin = vec![0.0; n / 2];
        let mut cos = vec![1.0; n / 2];
        // A DC bin at +90 degrees cannot come from a real signal
        sin[0] = 1.0;
        cos[0] = 0.0;

        let reconstruction = SpectrumSynthesizer::new(config(n))
            .synthesize(&magnitude, &sin, &cos)
            .unwrap();
        assert!((reconstruction.max_imaginary - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let synthesizer = SpectrumSynthesizer::new(config(16));
        assert!(synthesizer
            .synthesize(&[0.0; 8], &[0.0; 7], &[1.0; 8])
            .is_err());
        assert!(synthesizer
            .synthesize(&[0.0; 9], &[0.0; 9], &[1.0; 9])
            .is_err());
    }
}
