//! Equidistant index selection used to bring every signal to the codec length

use crate::error::SpectraError;
use crate::Result;

/// Shared set of sample positions taken from each original signal
///
/// Computed once per dataset from the original time length and applied to
/// every input and target signal, so bin k means the same physical
/// frequency across samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResampleIndex {
    original_length: usize,
    indices: Vec<usize>,
}

impl ResampleIndex {
    /// Build `round(linspace(0, L - 1, target_length))` with ties to even
    ///
    /// No interpolation is done: when `target_length` does not divide the
    /// original length some source positions repeat or are skipped.
    pub fn new(original_length: usize, target_length: usize) -> Result<Self> {
        if original_length == 0 {
            return Err(SpectraError::shape("original signal length", 1, 0));
        }
        if target_length == 0 {
            return Err(SpectraError::shape("resample target length", 1, 0));
        }

        let last = (original_length - 1) as f64;
        let indices = if target_length == 1 {
            vec![0]
        } else {
            let step = last / (target_length - 1) as f64;
            (0..target_length)
                .map(|i| {
                    let position = if i == target_length - 1 {
                        last
                    } else {
                        i as f64 * step
                    };
                    (position.round_ties_even() as usize).min(original_length - 1)
                })
                .collect()
        };

        log::debug!(
            "Resample index: {} samples -> {} positions",
            original_length,
            target_length
        );

        Ok(Self {
            original_length,
            indices,
        })
    }

    /// Length of the signals this index was built for
    pub fn original_length(&self) -> usize {
        self.original_length
    }

    /// Number of selected positions
    pub fn target_length(&self) -> usize {
        self.indices.len()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Gather the indexed samples of `signal`
    pub fn apply(&self, signal: &[f64]) -> Result<Vec<f64>> {
        let required = self.indices.last().map_or(0, |&i| i + 1);
        if signal.len() < required {
            return Err(SpectraError::shape("resampled signal length", required, signal.len()));
        }

        Ok(self.indices.iter().map(|&i| signal[i]).collect())
    }
}
