//! Forward transform: resampled signal to one-sided magnitude/phase

use super::core::{CodecConfig, SpectrumRepresentation};
use crate::error::SpectraError;
use crate::Result;
use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};
use std::f64::consts::PI;
use std::sync::Arc;

/// Analyzer computing the one-sided spectrum of N-point signals
pub struct SpectrumAnalyzer {
    config: CodecConfig,
    fft_forward: Arc<dyn RealToComplex<f64>>,
}

impl SpectrumAnalyzer {
    /// Create a new analyzer planned for `config.target_length` points
    pub fn new(config: CodecConfig) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let fft_forward = planner.plan_fft_forward(config.target_length);

        Self {
            config,
            fft_forward,
        }
    }

    /// Transform an already resampled signal
    ///
    /// Keeps bins [0, N/2); the Nyquist bin is dropped.
    pub fn analyze(&self, sampled: &[f64]) -> Result<SpectrumRepresentation> {
        let n = self.config.target_length;
        if sampled.len() != n {
            return Err(SpectraError::shape("analyzed signal length", n, sampled.len()));
        }

        // realfft uses the input as scratch space
        let mut input = sampled.to_vec();
        let mut spectrum = vec![Complex64::new(0.0, 0.0); n / 2 + 1];
        self.fft_forward
            .process(&mut input, &mut spectrum)
            .map_err(|e| SpectraError::Fft(e.to_string()))?;

        let num_bins = self.config.num_bins();
        let mut magnitude = Vec::with_capacity(num_bins);
        let mut phase = Vec::with_capacity(num_bins);

        for bin in &spectrum[..num_bins] {
            magnitude.push(bin.norm());
            phase.push(wrap_phase(bin.arg()));
        }

        Ok(SpectrumRepresentation { magnitude, phase })
    }
}

/// Map an angle from [-pi, pi] into (-pi, pi]
fn wrap_phase(angle: f64) -> f64 {
    if angle <= -PI {
        angle + 2.0 * PI
    } else {
        angle
    }
}
