//! Model configuration and device selection

use crate::error::SpectraError;
use crate::Result;
use candle_core::Device;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend that executes the tensor operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceKind {
    #[default]
    Cpu,
    /// CUDA device by ordinal, needs the `cuda` feature
    Cuda(usize),
}

impl DeviceKind {
    /// Open the candle device
    pub fn to_device(self) -> Result<Device> {
        match self {
            DeviceKind::Cpu => Ok(Device::Cpu),
            DeviceKind::Cuda(ordinal) => Ok(Device::new_cuda(ordinal)?),
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
        }
    }
}

impl FromStr for DeviceKind {
    type Err = SpectraError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        match lowered.as_str() {
            "cpu" => Ok(DeviceKind::Cpu),
            "cuda" | "gpu" => Ok(DeviceKind::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|ordinal| ordinal.parse().ok())
                .map(DeviceKind::Cuda)
                .ok_or_else(|| {
                    SpectraError::config("device", format!("expected cpu or cuda:N, got {}", s))
                }),
        }
    }
}

/// Hyperparameters of the spectral translator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// Sequence length: frequency bins per sample (N/2)
    pub num_bins: usize,
    /// Width of the conditioning vector
    pub num_parameters: usize,
    /// Embedding width shared by all streams
    pub d_model: usize,
    pub num_heads: usize,
    /// Number of encoder blocks
    pub num_layers: usize,
    /// Hidden width of each block's feedforward layer
    pub ff_dim: usize,
    /// Dropout probability, applied only while training
    pub dropout: f32,
    pub layer_norm_eps: f64,
    /// Added to the (sin, cos) norm before rescaling
    pub phase_eps: f64,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            num_bins: 200,
            num_parameters: 3,
            d_model: 64,
            num_heads: 4,
            num_layers: 3,
            ff_dim: 256,
            dropout: 0.1,
            layer_norm_eps: 1e-5,
            phase_eps: 1e-8,
        }
    }
}

impl TranslatorConfig {
    /// Default hyperparameters for a given data shape
    pub fn for_data(num_bins: usize, num_parameters: usize) -> Self {
        Self {
            num_bins,
            num_parameters,
            ..Self::default()
        }
    }

    pub fn head_dim(&self) -> usize {
        self.d_model / self.num_heads
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("num_bins", self.num_bins),
            ("num_parameters", self.num_parameters),
            ("d_model", self.d_model),
            ("num_heads", self.num_heads),
            ("num_layers", self.num_layers),
            ("ff_dim", self.ff_dim),
        ] {
            if value == 0 {
                return Err(SpectraError::config(name, "must be positive"));
            }
        }

        if self.d_model % 2 != 0 {
            return Err(SpectraError::config(
                "d_model",
                format!("must be even for the positional table, got {}", self.d_model),
            ));
        }

        if self.d_model % self.num_heads != 0 {
            return Err(SpectraError::config(
                "num_heads",
                format!("{} does not divide d_model {}", self.num_heads, self.d_model),
            ));
        }

        if !(0.0..1.0).contains(&self.dropout) {
            return Err(SpectraError::config(
                "dropout",
                format!("must be in [0, 1), got {}", self.dropout),
            ));
        }

        if self.layer_norm_eps <= 0.0 || self.phase_eps <= 0.0 {
            return Err(SpectraError::config("eps", "must be positive"));
        }

        Ok(())
    }
}
