//! Epoch/batch training loop

use super::loss::{LossValues, SpectralLoss};
use super::scheduler::WarmupCosineSchedule;
use crate::dataset::{Batch, BatchSampler, ConditionedDataset};
use crate::error::SpectraError;
use crate::model::SpectralTranslator;
use crate::Result;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use serde::{Deserialize, Serialize};

/// Training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// Peak learning rate of the one-cycle schedule
    pub learning_rate: f64,
    /// Decoupled AdamW weight decay
    pub weight_decay: f64,
    pub warmup_epochs: usize,
    /// Fixes the batch order; `None` draws from the OS
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 16,
            learning_rate: 1e-3,
            weight_decay: 1e-2,
            warmup_epochs: 5,
            seed: None,
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(SpectraError::config("epochs", "must be positive"));
        }
        if self.batch_size == 0 {
            return Err(SpectraError::config("batch_size", "must be positive"));
        }
        if self.warmup_epochs > self.epochs {
            return Err(SpectraError::config(
                "warmup_epochs",
                format!("{} exceeds epochs {}", self.warmup_epochs, self.epochs),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(SpectraError::config(
                "learning_rate",
                format!("must be positive and finite, got {}", self.learning_rate),
            ));
        }
        if !(self.weight_decay >= 0.0 && self.weight_decay.is_finite()) {
            return Err(SpectraError::config(
                "weight_decay",
                format!("must be non-negative, got {}", self.weight_decay),
            ));
        }
        Ok(())
    }
}

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Idle,
    Training { epoch: usize, batch: usize },
    /// Every configured epoch has run
    Finished,
}

/// Batch-averaged losses of one epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochLoss {
    /// 1-based epoch number
    pub epoch: usize,
    pub total: f64,
    pub magnitude: f64,
    pub phase: f64,
    /// Rate in effect after the epoch's last step
    pub learning_rate: f64,
}

impl EpochLoss {
    pub fn is_finite(&self) -> bool {
        self.total.is_finite() && self.magnitude.is_finite() && self.phase.is_finite()
    }
}

/// Per-epoch losses over a whole run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossHistory {
    epochs: Vec<EpochLoss>,
}

impl LossHistory {
    pub fn push(&mut self, epoch: EpochLoss) {
        self.epochs.push(epoch);
    }

    pub fn epochs(&self) -> &[EpochLoss] {
        &self.epochs
    }

    pub fn totals(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.total).collect()
    }

    /// Epoch with the lowest finite total loss
    pub fn best(&self) -> Option<&EpochLoss> {
        self.epochs
            .iter()
            .filter(|e| e.total.is_finite())
            .min_by(|a, b| a.total.total_cmp(&b.total))
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }
}

/// Drives AdamW over shuffled batches with a per-batch rate schedule
pub struct Trainer {
    config: TrainerConfig,
    optimizer: AdamW,
    schedule: WarmupCosineSchedule,
    sampler: BatchSampler,
    loss: SpectralLoss,
    history: LossHistory,
    state: TrainerState,
    num_samples: usize,
    epochs_completed: usize,
}

impl Trainer {
    /// Set up the optimizer and schedule for training `model` on `dataset`
    pub fn new(
        model: &SpectralTranslator,
        dataset: &ConditionedDataset,
        config: TrainerConfig,
    ) -> Result<Self> {
        config.validate()?;

        let model_config = model.config();
        if dataset.num_bins() != model_config.num_bins {
            return Err(SpectraError::shape(
                "model frequency bins",
                dataset.num_bins(),
                model_config.num_bins,
            ));
        }
        if dataset.num_parameters() != model_config.num_parameters {
            return Err(SpectraError::shape(
                "model parameter width",
                dataset.num_parameters(),
                model_config.num_parameters,
            ));
        }

        let sampler = BatchSampler::new(dataset.len(), config.batch_size, config.seed)?;
        let schedule = WarmupCosineSchedule::for_run(
            config.learning_rate,
            config.epochs,
            config.warmup_epochs,
            sampler.num_batches(),
        )?;

        let params = ParamsAdamW {
            lr: schedule.current(),
            weight_decay: config.weight_decay,
            ..Default::default()
        };
        let optimizer = AdamW::new(model.varmap().all_vars(), params)?;

        log::info!(
            "Trainer ready: {} samples, {} batches/epoch, {} steps ({} warmup)",
            dataset.len(),
            sampler.num_batches(),
            schedule.total_steps(),
            schedule.warmup_steps()
        );

        Ok(Self {
            config,
            optimizer,
            schedule,
            sampler,
            loss: SpectralLoss,
            history: LossHistory::default(),
            state: TrainerState::Idle,
            num_samples: dataset.len(),
            epochs_completed: 0,
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn history(&self) -> &LossHistory {
        &self.history
    }

    pub fn epochs_completed(&self) -> usize {
        self.epochs_completed
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    /// Run one pass over the dataset in a fresh random order
    ///
    /// A non-finite loss is logged and recorded as is; deciding whether to
    /// stop is left to the caller.
    pub fn train_epoch(
        &mut self,
        model: &SpectralTranslator,
        dataset: &ConditionedDataset,
    ) -> Result<EpochLoss> {
        if dataset.len() != self.num_samples {
            return Err(SpectraError::shape("dataset samples", self.num_samples, dataset.len()));
        }

        let epoch = self.epochs_completed + 1;
        let mut sums = LossValues::default();
        let batches = self.sampler.epoch();
        let num_batches = batches.len();

        for (batch_idx, indices) in batches.iter().enumerate() {
            self.state = TrainerState::Training {
                epoch,
                batch: batch_idx,
            };

            let batch = Batch::collate(dataset, indices, model.device())?;
            let prediction = model.forward(
                &batch.input_magnitude,
                &batch.input_phase_sin,
                &batch.input_phase_cos,
                &batch.parameters,
                true,
            )?;
            let components = self.loss.compute(&prediction, &batch)?;
            let values = components.values()?;

            if !values.is_finite() {
                log::warn!(
                    "Non-finite loss at epoch {} batch {}: {:?}",
                    epoch,
                    batch_idx,
                    values
                );
            }

            self.optimizer.backward_step(&components.total)?;
            let lr = self.schedule.step();
            self.optimizer.set_learning_rate(lr);

            log::debug!(
                "Epoch {} batch {}/{}: loss {:.6}, lr {:.3e}",
                epoch,
                batch_idx + 1,
                num_batches,
                values.total,
                lr
            );

            sums.total += values.total;
            sums.magnitude += values.magnitude;
            sums.phase += values.phase;
        }

        let count = num_batches.max(1) as f64;
        let summary = EpochLoss {
            epoch,
            total: sums.total / count,
            magnitude: sums.magnitude / count,
            phase: sums.phase / count,
            learning_rate: self.optimizer.learning_rate(),
        };

        log::info!(
            "Epoch {}/{}: loss {:.6} (magnitude {:.6}, phase {:.6}), lr {:.3e}",
            epoch,
            self.config.epochs,
            summary.total,
            summary.magnitude,
            summary.phase,
            summary.learning_rate
        );

        self.history.push(summary);
        self.epochs_completed = epoch;
        self.state = if epoch >= self.config.epochs {
            TrainerState::Finished
        } else {
            TrainerState::Idle
        };
        Ok(summary)
    }

    /// Train for the remaining configured epochs
    pub fn fit(
        &mut self,
        model: &SpectralTranslator,
        dataset: &ConditionedDataset,
    ) -> Result<&LossHistory> {
        log::info!(
            "Training for {} epochs (batch size {}, peak lr {:.3e})",
            self.config.epochs,
            self.config.batch_size,
            self.config.learning_rate
        );

        while self.epochs_completed < self.config.epochs {
            self.train_epoch(model, dataset)?;
        }

        if let Some(best) = self.history.best() {
            log::info!("Training finished, best loss {:.6} at epoch {}", best.total, best.epoch);
        }
        Ok(&self.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecConfig;
    use crate::model::TranslatorConfig;
    use candle_core::Device;
    use std::f64::consts::PI;

    fn toy_dataset() -> ConditionedDataset {
        let signal = |freq: f64, amp: f64| -> Vec<f64> {
            (0..64)
                .map(|i| amp * (2.0 * PI * freq * i as f64 / 64.0).sin())
                .collect()
        };
        let inputs: Vec<Vec<f64>> = (1..=4).map(|k| signal(k as f64, 1.0)).collect();
        let targets: Vec<Vec<f64>> = (1..=4).map(|k| signal(k as f64, 0.5 * k as f64)).collect();
        let params: Vec<Vec<f64>> = (1..=4).map(|k| vec![k as f64, 0.5 * k as f64]).collect();
        ConditionedDataset::new(&inputs, &params, &targets, CodecConfig::new(32).unwrap()).unwrap()
    }

    fn toy_model(dataset: &ConditionedDataset) -> SpectralTranslator {
        let config = TranslatorConfig {
            d_model: 16,
            num_heads: 2,
            num_layers: 1,
            ff_dim: 32,
            dropout: 0.0,
            ..TranslatorConfig::for_data(dataset.num_bins(), dataset.num_parameters())
        };
        SpectralTranslator::new(config, &Device::Cpu).unwrap()
    }

    fn snapshot(model: &SpectralTranslator) -> Vec<(String, Vec<f32>)> {
        let data = model.varmap().data().lock().unwrap();
        let mut weights: Vec<(String, Vec<f32>)> = data
            .iter()
            .map(|(name, var)| {
                let values = var.as_tensor().flatten_all().unwrap().to_vec1().unwrap();
                (name.clone(), values)
            })
            .collect();
        weights.sort_by(|a, b| a.0.cmp(&b.0));
        weights
    }

    fn toy_config() -> TrainerConfig {
        TrainerConfig {
            epochs: 3,
            batch_size: 2,
            learning_rate: 1e-3,
            warmup_epochs: 1,
            seed: Some(5),
            ..TrainerConfig::default()
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(TrainerConfig::default().validate().is_ok());

        let bad = [
            TrainerConfig {
                epochs: 0,
                ..TrainerConfig::default()
            },
            TrainerConfig {
                batch_size: 0,
                ..TrainerConfig::default()
            },
            TrainerConfig {
                warmup_epochs: 51,
                ..TrainerConfig::default()
            },
            TrainerConfig {
                learning_rate: f64::INFINITY,
                ..TrainerConfig::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{:?}", config);
        }
    }

    #[test]
    fn test_fit_records_every_epoch() {
        let dataset = toy_dataset();
        let model = toy_model(&dataset);
        let before = snapshot(&model);

        let mut trainer = Trainer::new(&model, &dataset, toy_config()).unwrap();
        assert_eq!(trainer.state(), TrainerState::Idle);

        let history = trainer.fit(&model, &dataset).unwrap();
        println!("Loss history: {:?}", history.totals());
        assert_eq!(history.len(), 3);
        assert!(history.epochs().iter().all(|e| e.is_finite()));
        assert_eq!(
            history.epochs().iter().map(|e| e.epoch).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(trainer.state(), TrainerState::Finished);
        assert_eq!(trainer.epochs_completed(), 3);

        // Schedule ends at the floor: peak / 25 / 1e4
        assert!((trainer.learning_rate() - 4e-9).abs() < 1e-12);

        assert_ne!(before, snapshot(&model));
    }

    #[test]
    fn test_state_between_epochs() {
        let dataset = toy_dataset();
        let model = toy_model(&dataset);
        let mut trainer = Trainer::new(&model, &dataset, toy_config()).unwrap();

        trainer.train_epoch(&model, &dataset).unwrap();
        assert_eq!(trainer.state(), TrainerState::Idle);
        trainer.train_epoch(&model, &dataset).unwrap();
        trainer.train_epoch(&model, &dataset).unwrap();
        assert_eq!(trainer.state(), TrainerState::Finished);

        // Nothing left to run
        assert_eq!(trainer.fit(&model, &dataset).unwrap().len(), 3);
        assert_eq!(trainer.state(), TrainerState::Finished);
    }

    #[test]
    fn test_non_finite_loss_is_recorded() {
        let signal = |freq: f64| -> Vec<f64> {
            (0..64)
                .map(|i| (2.0 * PI * freq * i as f64 / 64.0).sin())
                .collect()
        };
        let mut inputs: Vec<Vec<f64>> = (1..=4).map(|k| signal(k as f64)).collect();
        let targets = inputs.clone();
        let params: Vec<Vec<f64>> = (1..=4).map(|k| vec![k as f64, 1.0]).collect();
        // Index 0 always survives resampling
        inputs[0][0] = f64::NAN;
        let dataset =
            ConditionedDataset::new(&inputs, &params, &targets, CodecConfig::new(32).unwrap())
                .unwrap();
        let model = toy_model(&dataset);

        let config = TrainerConfig {
            epochs: 2,
            batch_size: 4,
            ..toy_config()
        };
        let mut trainer = Trainer::new(&model, &dataset, config).unwrap();
        let history = trainer.fit(&model, &dataset).unwrap();

        println!("Loss history: {:?}", history.totals());
        assert_eq!(history.len(), 2);
        assert!(history.totals().iter().any(|t| t.is_nan()));
        assert!(history.best().is_none());
        assert_eq!(trainer.state(), TrainerState::Finished);
    }

    #[test]
    fn test_rejects_mismatched_model() {
        let dataset = toy_dataset();
        let config = TranslatorConfig {
            d_model: 16,
            num_heads: 2,
            num_layers: 1,
            ff_dim: 32,
            ..TranslatorConfig::for_data(dataset.num_bins() + 1, dataset.num_parameters())
        };
        let model = SpectralTranslator::new(config, &Device::Cpu).unwrap();
        assert!(Trainer::new(&model, &dataset, toy_config()).is_err());
    }

    #[test]
    fn test_history_best() {
        let mut history = LossHistory::default();
        assert!(history.best().is_none());
        for (epoch, total) in [(1, 2.0), (2, f64::NAN), (3, 0.5), (4, 0.7)] {
            history.push(EpochLoss {
                epoch,
                total,
                magnitude: total,
                phase: 0.0,
                learning_rate: 1e-3,
            });
        }
        assert_eq!(history.best().unwrap().epoch, 3);
        assert!(!history.epochs()[1].is_finite());
    }
}
