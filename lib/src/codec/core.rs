//! Core types for the spectral codec

use crate::error::SpectraError;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Number of samples every signal is resampled to before the transform
pub const DEFAULT_TARGET_LENGTH: usize = 400;

/// Configuration for the spectral codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Resampled signal length N (the DFT size), must be even
    pub target_length: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            target_length: DEFAULT_TARGET_LENGTH,
        }
    }
}

impl CodecConfig {
    /// Create a new codec configuration with validation
    pub fn new(target_length: usize) -> Result<Self> {
        if target_length < 2 || target_length % 2 != 0 {
            return Err(SpectraError::config(
                "target_length",
                format!("must be an even number of at least 2, got {}", target_length),
            ));
        }

        Ok(Self { target_length })
    }

    /// Number of one-sided frequency bins kept (N/2)
    pub fn num_bins(&self) -> usize {
        self.target_length / 2
    }
}

/// One-sided magnitude/phase spectrum of a resampled signal
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumRepresentation {
    /// |X_k| for k in [0, N/2), never negative
    pub magnitude: Vec<f64>,
    /// arg X_k for k in [0, N/2), in (-pi, pi]
    pub phase: Vec<f64>,
}

impl SpectrumRepresentation {
    /// Number of bins in the representation
    pub fn len(&self) -> usize {
        self.magnitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitude.is_empty()
    }
}

/// Per-sample normalized magnitude with phase encoded on the unit circle
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSpectrum {
    /// (magnitude - mean) / std
    pub magnitude: Vec<f64>,
    pub phase_sin: Vec<f64>,
    pub phase_cos: Vec<f64>,
}

impl NormalizedSpectrum {
    pub fn len(&self) -> usize {
        self.magnitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitude.is_empty()
    }

    /// Phase angles recovered with the four-quadrant arctangent
    pub fn phase_angles(&self) -> Vec<f64> {
        phase_from_unit_pair(&self.phase_sin, &self.phase_cos)
    }
}

/// Mean/std pair used to normalize one sample's magnitude
///
/// Returned by normalization and passed back explicitly for
/// denormalization, so the exact inverse is always available.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeStats {
    pub mean: f64,
    /// Never zero: a zero spread is floored to 1
    pub std: f64,
}

impl Default for MagnitudeStats {
    fn default() -> Self {
        Self {
            mean: 0.0,
            std: 1.0,
        }
    }
}

/// Time-domain reconstruction together with the discarded imaginary residue
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub signal: Vec<f64>,
    /// Largest |imaginary part| left after the inverse transform
    pub max_imaginary: f64,
}

/// Recover angles from (sin, cos) pairs
pub fn phase_from_unit_pair(phase_sin: &[f64], phase_cos: &[f64]) -> Vec<f64> {
    phase_sin
        .iter()
        .zip(phase_cos)
        .map(|(&s, &c)| s.atan2(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_codec_config() {
        let config = CodecConfig::default();
        assert_eq!(config.target_length, 400);
        assert_eq!(config.num_bins(), 200);
    }

    #[test]
    fn test_codec_config_validation() {
        assert!(CodecConfig::new(64).is_ok());
        assert!(CodecConfig::new(0).is_err());
        assert!(CodecConfig::new(1).is_err());
        assert!(CodecConfig::new(401).is_err());
    }

    #[test]
    fn test_phase_from_unit_pair_quadrants() {
        let angles = [0.0, PI / 3.0, 2.0 * PI / 3.0, -PI / 4.0, -3.0 * PI / 4.0, PI];
        let sin: Vec<f64> = angles.iter().map(|a| a.sin()).collect();
        let cos: Vec<f64> = angles.iter().map(|a| a.cos()).collect();

        let recovered = phase_from_unit_pair(&sin, &cos);
        for (a, r) in angles.iter().zip(&recovered) {
            assert!((a - r).abs() < 1e-12, "expected {}, got {}", a, r);
        }
    }
}
