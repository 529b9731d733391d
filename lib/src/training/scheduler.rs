//! Per-batch learning rate schedule

use crate::error::SpectraError;
use crate::Result;
use std::f64::consts::PI;

/// Ratio between the peak rate and the rate at the first step
pub const WARMUP_DIV_FACTOR: f64 = 25.0;

/// Ratio between the starting rate and the rate at the last step
pub const FINAL_DIV_FACTOR: f64 = 1e4;

/// One-cycle schedule: linear warmup followed by cosine annealing
///
/// The rate climbs from `peak / 25` to `peak` over `warmup_steps`, then
/// follows half a cosine down to `peak / 25e4` at `total_steps`. Past the
/// end it stays at the floor.
#[derive(Debug, Clone)]
pub struct WarmupCosineSchedule {
    peak_lr: f64,
    initial_lr: f64,
    final_lr: f64,
    warmup_steps: usize,
    total_steps: usize,
    step: usize,
}

impl WarmupCosineSchedule {
    pub fn new(peak_lr: f64, warmup_steps: usize, total_steps: usize) -> Result<Self> {
        if !(peak_lr > 0.0 && peak_lr.is_finite()) {
            return Err(SpectraError::config(
                "learning_rate",
                format!("must be positive and finite, got {}", peak_lr),
            ));
        }
        if total_steps == 0 {
            return Err(SpectraError::config("total_steps", "must be positive"));
        }
        if warmup_steps > total_steps {
            return Err(SpectraError::config(
                "warmup_steps",
                format!("{} exceeds total steps {}", warmup_steps, total_steps),
            ));
        }

        let initial_lr = peak_lr / WARMUP_DIV_FACTOR;
        Ok(Self {
            peak_lr,
            initial_lr,
            final_lr: initial_lr / FINAL_DIV_FACTOR,
            warmup_steps,
            total_steps,
            step: 0,
        })
    }

    /// Schedule spanning `epochs` of `batches_per_epoch` steps each
    ///
    /// The warmup covers the fraction `warmup_epochs / epochs` of the run,
    /// rounded to whole steps.
    pub fn for_run(
        peak_lr: f64,
        epochs: usize,
        warmup_epochs: usize,
        batches_per_epoch: usize,
    ) -> Result<Self> {
        if epochs == 0 {
            return Err(SpectraError::config("epochs", "must be positive"));
        }
        let total_steps = epochs * batches_per_epoch;
        let warmup_steps =
            (total_steps as f64 * warmup_epochs as f64 / epochs as f64).round() as usize;
        Self::new(peak_lr, warmup_steps, total_steps)
    }

    /// Rate applied at step `step`
    pub fn learning_rate_at(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            let progress = step as f64 / self.warmup_steps as f64;
            return self.initial_lr + (self.peak_lr - self.initial_lr) * progress;
        }

        let decay_steps = (self.total_steps - self.warmup_steps).max(1);
        let elapsed = (step - self.warmup_steps).min(decay_steps);
        let progress = elapsed as f64 / decay_steps as f64;
        let cosine = 0.5 * (1.0 + (PI * progress).cos());
        self.final_lr + (self.peak_lr - self.final_lr) * cosine
    }

    /// Rate for the upcoming step
    pub fn current(&self) -> f64 {
        self.learning_rate_at(self.step)
    }

    /// Advance one step and return the new rate
    pub fn step(&mut self) -> f64 {
        self.step += 1;
        self.current()
    }

    pub fn warmup_steps(&self) -> usize {
        self.warmup_steps
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }
}
