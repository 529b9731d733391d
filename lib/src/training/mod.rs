//! Optimization of the translator

pub mod loss;
pub mod scheduler;
pub mod trainer;

pub use loss::{LossComponents, LossValues, SpectralLoss};
pub use scheduler::WarmupCosineSchedule;
pub use trainer::{EpochLoss, LossHistory, Trainer, TrainerConfig, TrainerState};
