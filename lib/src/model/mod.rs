//! Attention-based spectrum translator

pub mod config;
pub mod layers;
pub mod positional;
pub mod translator;

pub use config::{DeviceKind, TranslatorConfig};
pub use translator::{SpectralTranslator, TranslatorOutput};
