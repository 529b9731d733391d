//! Inference and time-domain reconstruction for individual samples

use crate::codec::phase_from_unit_pair;
use crate::dataset::{Batch, ConditionedDataset};
use crate::error::SpectraError;
use crate::model::SpectralTranslator;
use crate::Result;
use candle_core::{DType, Tensor};
use serde::{Deserialize, Serialize};

/// Everything needed to plot one prediction against its target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePrediction {
    pub index: usize,
    /// Normalized target magnitude per bin
    pub target_magnitude: Vec<f64>,
    /// Normalized predicted magnitude per bin
    pub predicted_magnitude: Vec<f64>,
    /// Target phase angle in (-pi, pi]
    pub target_phase: Vec<f64>,
    pub predicted_phase: Vec<f64>,
    /// Predicted spectrum decoded in physical units
    pub reconstructed_signal: Vec<f64>,
    /// Resampled target signal
    pub target_signal: Vec<f64>,
    /// Resampled input signal
    pub input_signal: Vec<f64>,
}

impl SamplePrediction {
    /// RMSE between the reconstructed and the resampled target signal
    pub fn signal_error(&self) -> Result<f64> {
        reconstruction_error(&self.reconstructed_signal, &self.target_signal)
    }
}

/// Runs a trained translator over dataset samples
pub struct Evaluator<'a> {
    model: &'a SpectralTranslator,
    dataset: &'a ConditionedDataset,
}

impl<'a> Evaluator<'a> {
    pub fn new(model: &'a SpectralTranslator, dataset: &'a ConditionedDataset) -> Result<Self> {
        let config = model.config();
        if config.num_bins != dataset.num_bins() {
            return Err(SpectraError::shape("model frequency bins", dataset.num_bins(), config.num_bins));
        }
        if config.num_parameters != dataset.num_parameters() {
            return Err(SpectraError::shape(
                "model parameter width",
                dataset.num_parameters(),
                config.num_parameters,
            ));
        }
        Ok(Self { model, dataset })
    }

    /// Predict sample `idx` and decode it back to the time domain
    ///
    /// The predicted magnitude is denormalized with the target-side stats of
    /// the same sample before decoding, so the reconstruction is in the
    /// units of the target signal.
    pub fn predict(&self, idx: usize) -> Result<SamplePrediction> {
        let record = self.dataset.record(idx)?;

        let batch = Batch::collate(self.dataset, &[idx], self.model.device())?;
        let output = self.model.forward(
            &batch.input_magnitude,
            &batch.input_phase_sin,
            &batch.input_phase_cos,
            &batch.parameters,
            false,
        )?;

        let predicted_magnitude = first_row(&output.magnitude)?;
        let predicted_sin = first_row(&output.phase_sin)?;
        let predicted_cos = first_row(&output.phase_cos)?;

        let physical = self.dataset.denormalize_magnitude(&predicted_magnitude, idx)?;
        let reconstructed_signal =
            self.dataset
                .reconstruct(&physical, &predicted_sin, &predicted_cos, idx)?;

        log::debug!("Predicted sample {}", idx);

        Ok(SamplePrediction {
            index: idx,
            target_magnitude: record.target.magnitude.clone(),
            predicted_magnitude,
            target_phase: record.target.phase_angles(),
            predicted_phase: phase_from_unit_pair(&predicted_sin, &predicted_cos),
            reconstructed_signal,
            target_signal: record.target_signal.clone(),
            input_signal: record.input_signal.clone(),
        })
    }

    /// Predict every sample in order
    pub fn predict_all(&self) -> Result<Vec<SamplePrediction>> {
        log::info!("Evaluating {} samples", self.dataset.len());
        (0..self.dataset.len()).map(|idx| self.predict(idx)).collect()
    }
}

/// Root-mean-square difference between two equally long signals
pub fn reconstruction_error(signal: &[f64], reference: &[f64]) -> Result<f64> {
    if signal.len() != reference.len() {
        return Err(SpectraError::shape("reconstruction length", reference.len(), signal.len()));
    }
    if signal.is_empty() {
        return Ok(0.0);
    }

    let sum_sq: f64 = signal
        .iter()
        .zip(reference)
        .map(|(a, b)| (a - b).powi(2))
        .sum();
    Ok((sum_sq / signal.len() as f64).sqrt())
}

/// Row 0 of a `[1, bins]` tensor as f64
fn first_row(tensor: &Tensor) -> Result<Vec<f64>> {
    Ok(tensor.get(0)?.to_dtype(DType::F64)?.to_vec1::<f64>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecConfig;
    use crate::model::TranslatorConfig;
    use candle_core::Device;
    use std::f64::consts::PI;

    fn dataset() -> ConditionedDataset {
        let inputs: Vec<Vec<f64>> = (1..=3)
            .map(|k| {
                (0..100)
                    .map(|i| (2.0 * PI * k as f64 * i as f64 / 100.0).cos())
                    .collect()
            })
            .collect();
        let targets: Vec<Vec<f64>> = inputs
            .iter()
            .map(|s| s.iter().map(|v| 2.0 * v).collect())
            .collect();
        let params: Vec<Vec<f64>> = (1..=3).map(|k| vec![k as f64]).collect();
        ConditionedDataset::new(&inputs, &params, &targets, CodecConfig::new(50).unwrap()).unwrap()
    }

    fn model(dataset: &ConditionedDataset) -> SpectralTranslator {
        let config = TranslatorConfig {
            d_model: 8,
            num_heads: 2,
            num_layers: 1,
            ff_dim: 16,
            ..TranslatorConfig::for_data(dataset.num_bins(), dataset.num_parameters())
        };
        SpectralTranslator::new(config, &Device::Cpu).unwrap()
    }

    #[test]
    fn test_prediction_shapes() {
        let dataset = dataset();
        let model = model(&dataset);
        let evaluator = Evaluator::new(&model, &dataset).unwrap();

        let prediction = evaluator.predict(1).unwrap();
        assert_eq!(prediction.index, 1);
        assert_eq!(prediction.target_magnitude.len(), 25);
        assert_eq!(prediction.predicted_magnitude.len(), 25);
        assert_eq!(prediction.target_phase.len(), 25);
        assert_eq!(prediction.predicted_phase.len(), 25);
        assert_eq!(prediction.reconstructed_signal.len(), 50);
        assert_eq!(prediction.target_signal.len(), 50);
        assert_eq!(prediction.input_signal.len(), 50);
        assert!(prediction.reconstructed_signal.iter().all(|v| v.is_finite()));
        assert!(prediction
            .predicted_phase
            .iter()
            .all(|p| *p > -PI - 1e-9 && *p <= PI + 1e-9));

        let error = prediction.signal_error().unwrap();
        println!("Untrained reconstruction RMSE: {:.4}", error);
        assert!(error.is_finite());
    }

    #[test]
    fn test_predict_all_and_out_of_range() {
        let dataset = dataset();
        let model = model(&dataset);
        let evaluator = Evaluator::new(&model, &dataset).unwrap();

        let all = evaluator.predict_all().unwrap();
        assert_eq!(all.iter().map(|p| p.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(matches!(
            evaluator.predict(3),
            Err(SpectraError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_prediction_serializes() {
        let dataset = dataset();
        let model = model(&dataset);
        let prediction = Evaluator::new(&model, &dataset).unwrap().predict(0).unwrap();

        let json = serde_json::to_string(&prediction).unwrap();
        let back: SamplePrediction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.index, 0);
        assert_eq!(back.target_signal.len(), prediction.target_signal.len());
    }

    #[test]
    fn test_reconstruction_error() {
        assert_eq!(reconstruction_error(&[1.0, 2.0], &[1.0, 2.0]).unwrap(), 0.0);
        let rmse = reconstruction_error(&[0.0, 0.0], &[3.0, 4.0]).unwrap();
        assert!((rmse - 12.5f64.sqrt()).abs() < 1e-12);
        assert!(reconstruction_error(&[1.0], &[1.0, 2.0]).is_err());
    }
}
