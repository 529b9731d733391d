//! Persisted training results
//!
//! A bundle carries everything needed to rebuild a trained translator and
//! feed it data prepared the same way: codec length, model and trainer
//! configuration, parameter statistics and the loss history. It is written
//! as a JSON manifest with the weight tensors in a safetensors file next to
//! it (`bundle.json` and `bundle.safetensors`).

use crate::codec::CodecConfig;
use crate::dataset::{ConditionedDataset, ParameterStats};
use crate::error::SpectraError;
use crate::model::{SpectralTranslator, TranslatorConfig};
use crate::training::{LossHistory, Trainer, TrainerConfig};
use crate::Result;
use candle_core::Device;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Format revision written into every bundle
pub const BUNDLE_VERSION: u32 = 2;

const WEIGHTS_EXTENSION: &str = "safetensors";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingBundle {
    pub version: u32,
    pub codec: CodecConfig,
    pub translator: TranslatorConfig,
    pub trainer: TrainerConfig,
    pub parameter_stats: ParameterStats,
    /// Columns of the parameter table the model was trained on
    pub parameter_columns: Vec<usize>,
    pub history: LossHistory,
}

/// Weight file belonging to the manifest at `path`
pub fn weights_path<P: AsRef<Path>>(path: P) -> PathBuf {
    path.as_ref().with_extension(WEIGHTS_EXTENSION)
}

impl TrainingBundle {
    /// Describe a model after training on `dataset`
    pub fn capture(
        model: &SpectralTranslator,
        dataset: &ConditionedDataset,
        trainer: &Trainer,
        parameter_columns: Vec<usize>,
    ) -> Self {
        Self {
            version: BUNDLE_VERSION,
            codec: *dataset.codec().config(),
            translator: model.config().clone(),
            trainer: trainer.config().clone(),
            parameter_stats: dataset.parameter_stats().clone(),
            parameter_columns,
            history: trainer.history().clone(),
        }
    }

    /// Write the manifest to `path` and the weights of `model` beside it
    pub fn save<P: AsRef<Path>>(&self, model: &SpectralTranslator, path: P) -> Result<()> {
        let path = path.as_ref();
        let weights = weights_path(path);
        if weights == path {
            return Err(SpectraError::config(
                "bundle path",
                format!("{} would be overwritten by the weights", path.display()),
            ));
        }
        if model.config() != &self.translator {
            return Err(SpectraError::config(
                "bundle model",
                "model configuration differs from the captured one",
            ));
        }

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        model.save_weights(&weights)?;

        log::info!(
            "Saved bundle to {} with weights in {}",
            path.display(),
            weights.display()
        );
        Ok(())
    }

    /// Read a manifest; the weights are read by [`SpectralTranslator::from_bundle`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let bundle: Self = serde_json::from_reader(reader)?;

        if bundle.version != BUNDLE_VERSION {
            return Err(SpectraError::config(
                "bundle version",
                format!("expected {}, found {}", BUNDLE_VERSION, bundle.version),
            ));
        }

        log::info!("Loaded bundle from {}", path.display());
        Ok(bundle)
    }
}

impl SpectralTranslator {
    /// Rebuild a trained translator from the bundle saved at `path`
    pub fn from_bundle<P: AsRef<Path>>(
        bundle: &TrainingBundle,
        path: P,
        device: &Device,
    ) -> Result<Self> {
        let mut model = SpectralTranslator::new(bundle.translator.clone(), device)?;
        model.load_weights(weights_path(path))?;
        Ok(model)
    }
}
