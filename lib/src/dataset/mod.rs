//! Paired input/target signals with conditioning parameters
//!
//! Every input and target signal is resampled with one shared index set,
//! encoded and normalized once at construction. Parameters are normalized
//! with statistics computed across the whole collection.

use crate::codec::{
    CodecConfig, MagnitudeStats, NormalizedSpectrum, ResampleIndex, SpectralCodec,
};
use crate::codec::normalize::floor_std;
use crate::error::SpectraError;
use crate::Result;
use serde::{Deserialize, Serialize};

pub mod batch;

pub use batch::{Batch, BatchSampler};

/// Column-wise mean/std of the parameter table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterStats {
    pub mean: Vec<f64>,
    /// Zero-variance columns are floored to 1
    pub std: Vec<f64>,
}

impl ParameterStats {
    /// Population statistics over all rows, computed once per dataset
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map_or(0, |row| row.len());
        let count = rows.len().max(1) as f64;

        let mut mean = vec![0.0; width];
        for row in rows {
            for (m, &v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in mean.iter_mut() {
            *m /= count;
        }

        let mut variance = vec![0.0; width];
        for row in rows {
            for ((var, &v), &m) in variance.iter_mut().zip(row).zip(&mean) {
                *var += (v - m).powi(2);
            }
        }
        let std = variance
            .into_iter()
            .map(|var| floor_std((var / count).sqrt()))
            .collect();

        Self { mean, std }
    }

    pub fn num_parameters(&self) -> usize {
        self.mean.len()
    }

    pub fn normalize(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(&v, (&m, &s))| (v - m) / s)
            .collect()
    }
}

/// Everything derived for one (input, parameters, target) triple
#[derive(Debug, Clone)]
pub struct DatasetRecord {
    pub input: NormalizedSpectrum,
    /// Globally normalized parameters
    pub parameters: Vec<f64>,
    pub target: NormalizedSpectrum,
    /// Resampled input before any transform
    pub input_signal: Vec<f64>,
    /// Resampled target before any transform
    pub target_signal: Vec<f64>,
    pub input_stats: MagnitudeStats,
    pub target_stats: MagnitudeStats,
}

/// Borrowed view of the seven per-sample vectors fed to the model
#[derive(Debug, Clone, Copy)]
pub struct SampleView<'a> {
    pub input_magnitude: &'a [f64],
    pub input_phase_sin: &'a [f64],
    pub input_phase_cos: &'a [f64],
    pub parameters: &'a [f64],
    pub target_magnitude: &'a [f64],
    pub target_phase_sin: &'a [f64],
    pub target_phase_cos: &'a [f64],
}

/// Dataset of encoded spectra, immutable after construction
pub struct ConditionedDataset {
    codec: SpectralCodec,
    index: ResampleIndex,
    records: Vec<DatasetRecord>,
    parameter_stats: ParameterStats,
}

impl ConditionedDataset {
    /// Build the dataset from three parallel collections
    ///
    /// Fails with [`SpectraError::ShapeMismatch`] when the row counts
    /// disagree, the collections are empty, or any signal/parameter row has
    /// a non-positive or inconsistent length.
    pub fn new(
        inputs: &[Vec<f64>],
        parameters: &[Vec<f64>],
        targets: &[Vec<f64>],
        config: CodecConfig,
    ) -> Result<Self> {
        Self::build(inputs, parameters, targets, config, None)
    }

    /// Like [`ConditionedDataset::new`], normalizing parameters with
    /// previously computed statistics instead of this collection's own
    pub fn with_parameter_stats(
        inputs: &[Vec<f64>],
        parameters: &[Vec<f64>],
        targets: &[Vec<f64>],
        config: CodecConfig,
        parameter_stats: ParameterStats,
    ) -> Result<Self> {
        Self::build(inputs, parameters, targets, config, Some(parameter_stats))
    }

    fn build(
        inputs: &[Vec<f64>],
        parameters: &[Vec<f64>],
        targets: &[Vec<f64>],
        config: CodecConfig,
        parameter_stats: Option<ParameterStats>,
    ) -> Result<Self> {
        let num_samples = inputs.len();
        if parameters.len() != num_samples {
            return Err(SpectraError::shape("parameter rows", num_samples, parameters.len()));
        }
        if targets.len() != num_samples {
            return Err(SpectraError::shape("target rows", num_samples, targets.len()));
        }
        if num_samples == 0 {
            return Err(SpectraError::shape("dataset rows", 1, 0));
        }

        let time_length = check_uniform_width(inputs, "input signal length")?;
        check_uniform_width(targets, "target signal length")?;
        let num_parameters = check_uniform_width(parameters, "parameter row length")?;

        let parameter_stats = match parameter_stats {
            Some(stats) if stats.num_parameters() != num_parameters => {
                return Err(SpectraError::shape(
                    "parameter statistics",
                    num_parameters,
                    stats.num_parameters(),
                ));
            }
            Some(stats) => stats,
            None => ParameterStats::from_rows(parameters),
        };

        let codec = SpectralCodec::new(config);
        let index = codec.index_for(time_length)?;

        log::info!(
            "Encoding dataset: {} samples, {} time steps -> {} points, {} bins, {} parameters",
            num_samples,
            time_length,
            codec.target_length(),
            codec.num_bins(),
            parameter_stats.num_parameters()
        );

        let mut records = Vec::with_capacity(num_samples);
        for (i, ((input, params), target)) in
            inputs.iter().zip(parameters).zip(targets).enumerate()
        {
            log::debug!("Encoding sample {}/{}", i + 1, num_samples);

            let (input_signal, input_spectrum) = codec.encode_with_index(input, &index)?;
            let (target_signal, target_spectrum) = codec.encode_with_index(target, &index)?;
            let (input_normalized, input_stats) = SpectralCodec::normalize(&input_spectrum, None);
            let (target_normalized, target_stats) =
                SpectralCodec::normalize(&target_spectrum, None);

            records.push(DatasetRecord {
                input: input_normalized,
                parameters: parameter_stats.normalize(params),
                target: target_normalized,
                input_signal,
                target_signal,
                input_stats,
                target_stats,
            });
        }

        Ok(Self {
            codec,
            index,
            records,
            parameter_stats,
        })
    }

    /// Number of samples M
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resampled length N
    pub fn target_length(&self) -> usize {
        self.codec.target_length()
    }

    /// Number of frequency bins per sample (N/2)
    pub fn num_bins(&self) -> usize {
        self.codec.num_bins()
    }

    pub fn num_parameters(&self) -> usize {
        self.parameter_stats.num_parameters()
    }

    pub fn codec(&self) -> &SpectralCodec {
        &self.codec
    }

    pub fn resample_index(&self) -> &ResampleIndex {
        &self.index
    }

    pub fn parameter_stats(&self) -> &ParameterStats {
        &self.parameter_stats
    }

    /// Full record for sample `idx`
    pub fn record(&self, idx: usize) -> Result<&DatasetRecord> {
        self.records.get(idx).ok_or(SpectraError::IndexOutOfRange {
            index: idx,
            len: self.records.len(),
        })
    }

    /// The seven model-facing vectors of sample `idx`
    pub fn get(&self, idx: usize) -> Result<SampleView<'_>> {
        let record = self.record(idx)?;
        Ok(SampleView {
            input_magnitude: &record.input.magnitude,
            input_phase_sin: &record.input.phase_sin,
            input_phase_cos: &record.input.phase_cos,
            parameters: &record.parameters,
            target_magnitude: &record.target.magnitude,
            target_phase_sin: &record.target.phase_sin,
            target_phase_cos: &record.target.phase_cos,
        })
    }

    /// Decode a (magnitude, sin, cos) triple with this dataset's length
    ///
    /// `idx` is validated so callers cannot reconstruct against a sample
    /// that does not exist; the magnitude is used in the scale given.
    pub fn reconstruct(
        &self,
        magnitude: &[f64],
        phase_sin: &[f64],
        phase_cos: &[f64],
        idx: usize,
    ) -> Result<Vec<f64>> {
        self.record(idx)?;
        self.codec.decode(magnitude, phase_sin, phase_cos)
    }

    /// Undo the magnitude normalization with the target-side stats of `idx`
    pub fn denormalize_magnitude(&self, magnitude: &[f64], idx: usize) -> Result<Vec<f64>> {
        let record = self.record(idx)?;
        Ok(SpectralCodec::denormalize(magnitude, &record.target_stats))
    }
}

/// All rows must share one positive width; returns it
fn check_uniform_width(rows: &[Vec<f64>], context: &str) -> Result<usize> {
    let width = rows.first().map_or(0, |row| row.len());
    if width == 0 {
        return Err(SpectraError::shape(context, 1, 0));
    }
    if let Some(row) = rows.iter().find(|row| row.len() != width) {
        return Err(SpectraError::shape(context, width, row.len()));
    }
    Ok(width)
}
