//! Spectral reconstruction loss

use crate::dataset::Batch;
use crate::model::TranslatorOutput;
use crate::Result;
use candle_core::Tensor;
use candle_nn::loss::mse;
use serde::{Deserialize, Serialize};

/// Weight of the phase term relative to the magnitude term
pub const PHASE_WEIGHT: f64 = 0.5;

/// Scalar loss tensors for one batch, still attached to the graph
pub struct LossComponents {
    pub total: Tensor,
    pub magnitude: Tensor,
    pub phase: Tensor,
}

/// Host-side copy of the loss terms
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LossValues {
    pub total: f64,
    pub magnitude: f64,
    pub phase: f64,
}

impl LossValues {
    pub fn is_finite(&self) -> bool {
        self.total.is_finite() && self.magnitude.is_finite() && self.phase.is_finite()
    }
}

impl LossComponents {
    pub fn values(&self) -> Result<LossValues> {
        Ok(LossValues {
            total: self.total.to_scalar::<f32>()? as f64,
            magnitude: self.magnitude.to_scalar::<f32>()? as f64,
            phase: self.phase.to_scalar::<f32>()? as f64,
        })
    }
}

/// Magnitude MSE plus half the summed MSE of the sin and cos streams
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralLoss;

impl SpectralLoss {
    pub fn compute(&self, prediction: &TranslatorOutput, batch: &Batch) -> Result<LossComponents> {
        let magnitude = mse(&prediction.magnitude, &batch.target_magnitude)?;
        let sin = mse(&prediction.phase_sin, &batch.target_phase_sin)?;
        let cos = mse(&prediction.phase_cos, &batch.target_phase_cos)?;
        let phase = (sin + cos)?.affine(PHASE_WEIGHT, 0.0)?;
        let total = magnitude.add(&phase)?;

        Ok(LossComponents {
            total,
            magnitude,
            phase,
        })
    }
}
