//! Per-sample magnitude normalization and unit-circle phase encoding

use super::core::{MagnitudeStats, NormalizedSpectrum, SpectrumRepresentation};

/// Spread below which a sample counts as degenerate and gets std = 1
pub const VARIANCE_FLOOR: f64 = 1e-12;

impl MagnitudeStats {
    /// Population mean/std of `values`, flooring a zero spread to 1
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;

        Self {
            mean,
            std: floor_std(variance.sqrt()),
        }
    }
}

/// Replace a (near) zero standard deviation by 1
pub fn floor_std(std: f64) -> f64 {
    if std < VARIANCE_FLOOR {
        log::debug!("Degenerate spread {:.3e} floored to 1", std);
        1.0
    } else {
        std
    }
}

/// Normalize a spectrum's magnitude and encode its phase as (sin, cos)
///
/// When `stats` is `None` they are computed from this sample's own bins.
/// The stats actually applied are returned for later inversion.
pub fn normalize(
    spectrum: &SpectrumRepresentation,
    stats: Option<MagnitudeStats>,
) -> (NormalizedSpectrum, MagnitudeStats) {
    let stats = stats.unwrap_or_else(|| MagnitudeStats::from_values(&spectrum.magnitude));

    let magnitude = spectrum
        .magnitude
        .iter()
        .map(|&m| (m - stats.mean) / stats.std)
        .collect();

    let (phase_sin, phase_cos) = spectrum.phase.iter().map(|p| p.sin_cos()).unzip();

    (
        NormalizedSpectrum {
            magnitude,
            phase_sin,
            phase_cos,
        },
        stats,
    )
}

/// Inverse of the magnitude normalization: `m * std + mean`
pub fn denormalize(magnitude_normalized: &[f64], stats: &MagnitudeStats) -> Vec<f64> {
    magnitude_normalized
        .iter()
        .map(|&m| m * stats.std + stats.mean)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn spectrum(magnitude: Vec<f64>) -> SpectrumRepresentation {
        let phase = (0..magnitude.len())
            .map(|i| -PI + 0.1 + i as f64 * 0.37 % (2.0 * PI))
            .collect();
        SpectrumRepresentation { magnitude, phase }
    }

    #[test]
    fn test_zero_mean_unit_variance() {
        let (normalized, stats) = normalize(&spectrum(vec![1.0, 2.0, 3.0, 4.0, 10.0]), None);
        let n = normalized.len() as f64;
        let mean = normalized.magnitude.iter().sum::<f64>() / n;
        let var = normalized.magnitude.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / n;

        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
        assert!((stats.mean - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_variance_floor() {
        let (normalized, stats) = normalize(&spectrum(vec![2.5; 200]), None);
        assert_eq!(stats.std, 1.0);
        assert!(normalized.magnitude.iter().all(|&m| m == 0.0));
        assert!(normalized.magnitude.iter().all(|m| m.is_finite()));
    }

    #[test]
    fn test_unit_circle_encoding() {
        let (normalized, _) = normalize(&spectrum(vec![1.0; 50]), None);
        for (s, c) in normalized.phase_sin.iter().zip(&normalized.phase_cos) {
            assert!((s * s + c * c - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_reuses_supplied_stats() {
        let stats = MagnitudeStats { mean: 1.0, std: 2.0 };
        let (normalized, used) = normalize(&spectrum(vec![1.0, 3.0, 5.0]), Some(stats));
        assert_eq!(used, stats);
        assert_eq!(normalized.magnitude, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_denormalize_inverts_normalize() {
        let original = vec![0.3, 7.1, 2.2, 0.0, 4.4, 19.5];
        let (normalized, stats) = normalize(&spectrum(original.clone()), None);
        let restored = denormalize(&normalized.magnitude, &stats);
        for (a, b) in original.iter().zip(&restored) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
