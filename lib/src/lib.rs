//! Spectra Library
//!
//! A library for learning translations between paired time signals in the
//! frequency domain. Signals are encoded as one-sided magnitude/phase
//! spectra, translated bin-by-bin by a parameter-conditioned attention model,
//! and decoded back to the time domain.

pub mod bundle;
pub mod codec;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod model;
pub mod table_io;
pub mod training;
pub mod utils;

pub use codec::{CodecConfig, MagnitudeStats, SpectralCodec};
pub use dataset::ConditionedDataset;
pub use error::SpectraError;
pub use model::{DeviceKind, SpectralTranslator, TranslatorConfig};
pub use num_complex::Complex64;
pub use training::{Trainer, TrainerConfig};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
///
/// Sets up logging for native builds.
pub fn init() {
    #[cfg(feature = "env_logger")]
    {
        // A second call (tests, embedding applications) is harmless
        let _ = env_logger::try_init();
    }
}

/// Result type for all library operations
pub type Result<T> = std::result::Result<T, SpectraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        init();
        init();
        assert!(!VERSION.is_empty());
    }
}
