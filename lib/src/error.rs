//! Error types shared by every stage of the pipeline

use thiserror::Error;

/// Errors raised by the codec, dataset, model and trainer
#[derive(Debug, Error)]
pub enum SpectraError {
    /// Collections or vectors whose sizes disagree, or a non-positive length
    #[error("Shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        got: usize,
    },

    /// Sample index past the end of a dataset
    #[error("Index {index} out of range for dataset of {len} samples")]
    IndexOutOfRange { index: usize, len: usize },

    /// Configuration value rejected during validation
    #[error("Invalid configuration for {parameter}: {reason}")]
    InvalidConfig { parameter: String, reason: String },

    /// FFT planning or processing failure
    #[error("FFT error: {0}")]
    Fft(String),

    /// Tensor backend failure
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed numeric table
    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SpectraError {
    /// Shorthand for a [`SpectraError::ShapeMismatch`]
    pub fn shape(context: impl Into<String>, expected: usize, got: usize) -> Self {
        SpectraError::ShapeMismatch {
            context: context.into(),
            expected,
            got,
        }
    }

    /// Shorthand for a [`SpectraError::InvalidConfig`]
    pub fn config(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        SpectraError::InvalidConfig {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}
