//! Invertible time <-> frequency codec
//!
//! Signals are resampled to a fixed length N, transformed with a real FFT,
//! truncated to the first N/2 bins and split into a per-sample normalized
//! magnitude and a (sin, cos) phase pair. Decoding rebuilds the full
//! spectrum through Hermitian symmetry and inverts it.

pub mod analyzer;
pub mod core;
pub mod normalize;
pub mod resample;
pub mod synthesizer;

pub use analyzer::SpectrumAnalyzer;
pub use self::core::{
    phase_from_unit_pair, CodecConfig, MagnitudeStats, NormalizedSpectrum, Reconstruction,
    SpectrumRepresentation, DEFAULT_TARGET_LENGTH,
};
pub use resample::ResampleIndex;
pub use synthesizer::{hermitian_spectrum, SpectrumSynthesizer};

use crate::Result;

/// Forward and inverse spectral codec for one signal length
///
/// Holds only the cached FFT plans; no per-sample state.
pub struct SpectralCodec {
    config: CodecConfig,
    analyzer: SpectrumAnalyzer,
    synthesizer: SpectrumSynthesizer,
}

impl SpectralCodec {
    /// Create a codec for `config.target_length` points
    pub fn new(config: CodecConfig) -> Self {
        Self {
            config,
            analyzer: SpectrumAnalyzer::new(config),
            synthesizer: SpectrumSynthesizer::new(config),
        }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Resampled length N
    pub fn target_length(&self) -> usize {
        self.config.target_length
    }

    /// Number of one-sided bins N/2
    pub fn num_bins(&self) -> usize {
        self.config.num_bins()
    }

    /// Index set mapping signals of `original_length` samples onto N points
    pub fn index_for(&self, original_length: usize) -> Result<ResampleIndex> {
        ResampleIndex::new(original_length, self.config.target_length)
    }

    /// Resample a raw time signal with its own index set and transform it
    pub fn encode(&self, time_signal: &[f64]) -> Result<SpectrumRepresentation> {
        let index = self.index_for(time_signal.len())?;
        self.encode_with_index(time_signal, &index)
            .map(|(_, spectrum)| spectrum)
    }

    /// Resample with a shared index set; returns the sampled signal as well
    pub fn encode_with_index(
        &self,
        time_signal: &[f64],
        index: &ResampleIndex,
    ) -> Result<(Vec<f64>, SpectrumRepresentation)> {
        let sampled = index.apply(time_signal)?;
        let spectrum = self.analyzer.analyze(&sampled)?;
        Ok((sampled, spectrum))
    }

    /// Transform a signal that already has N samples
    pub fn encode_sampled(&self, sampled: &[f64]) -> Result<SpectrumRepresentation> {
        self.analyzer.analyze(sampled)
    }

    /// Per-sample magnitude normalization and (sin, cos) phase encoding
    pub fn normalize(
        spectrum: &SpectrumRepresentation,
        stats: Option<MagnitudeStats>,
    ) -> (NormalizedSpectrum, MagnitudeStats) {
        normalize::normalize(spectrum, stats)
    }

    /// Exact inverse of the magnitude normalization
    pub fn denormalize(magnitude_normalized: &[f64], stats: &MagnitudeStats) -> Vec<f64> {
        normalize::denormalize(magnitude_normalized, stats)
    }

    /// Rebuild the N-point time signal from magnitude and (sin, cos) phase
    ///
    /// The output is in whatever amplitude scale `magnitude` is given in;
    /// denormalize first to get back to physical units.
    pub fn decode(&self, magnitude: &[f64], phase_sin: &[f64], phase_cos: &[f64]) -> Result<Vec<f64>> {
        self.decode_with_residual(magnitude, phase_sin, phase_cos)
            .map(|reconstruction| reconstruction.signal)
    }

    /// Like [`SpectralCodec::decode`], also reporting the imaginary residue
    pub fn decode_with_residual(
        &self,
        magnitude: &[f64],
        phase_sin: &[f64],
        phase_cos: &[f64],
    ) -> Result<Reconstruction> {
        self.synthesizer.synthesize(magnitude, phase_sin, phase_cos)
    }
}
