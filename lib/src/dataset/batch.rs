//! Shuffled batching and tensor collation

use super::ConditionedDataset;
use crate::error::SpectraError;
use crate::Result;
use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Stacked model inputs and targets for a group of samples
///
/// Per-bin streams are `[batch, bins]`, parameters `[batch, num_parameters]`.
#[derive(Debug, Clone)]
pub struct Batch {
    pub indices: Vec<usize>,
    pub input_magnitude: Tensor,
    pub input_phase_sin: Tensor,
    pub input_phase_cos: Tensor,
    pub parameters: Tensor,
    pub target_magnitude: Tensor,
    pub target_phase_sin: Tensor,
    pub target_phase_cos: Tensor,
}

impl Batch {
    /// Gather `indices` from `dataset` into f32 tensors on `device`
    pub fn collate(dataset: &ConditionedDataset, indices: &[usize], device: &Device) -> Result<Self> {
        if indices.is_empty() {
            return Err(SpectraError::shape("batch size", 1, 0));
        }

        let rows = indices.len();
        let bins = dataset.num_bins();
        let num_parameters = dataset.num_parameters();

        let mut streams: [Vec<f32>; 6] = Default::default();
        let mut parameters = Vec::with_capacity(rows * num_parameters);
        for stream in streams.iter_mut() {
            stream.reserve(rows * bins);
        }

        for &idx in indices {
            let view = dataset.get(idx)?;
            let sources = [
                view.input_magnitude,
                view.input_phase_sin,
                view.input_phase_cos,
                view.target_magnitude,
                view.target_phase_sin,
                view.target_phase_cos,
            ];
            for (stream, source) in streams.iter_mut().zip(sources) {
                stream.extend(source.iter().map(|&v| v as f32));
            }
            parameters.extend(view.parameters.iter().map(|&v| v as f32));
        }

        let [input_magnitude, input_phase_sin, input_phase_cos, target_magnitude, target_phase_sin, target_phase_cos] =
            streams.map(|stream| Tensor::from_vec(stream, (rows, bins), device));

        Ok(Self {
            indices: indices.to_vec(),
            input_magnitude: input_magnitude?,
            input_phase_sin: input_phase_sin?,
            input_phase_cos: input_phase_cos?,
            parameters: Tensor::from_vec(parameters, (rows, num_parameters), device)?,
            target_magnitude: target_magnitude?,
            target_phase_sin: target_phase_sin?,
            target_phase_cos: target_phase_cos?,
        })
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Draws a fresh random batch order every epoch
pub struct BatchSampler {
    batch_size: usize,
    indices: Vec<usize>,
    rng: StdRng,
}

impl BatchSampler {
    /// Sampler over `len` samples; `seed` makes the order reproducible
    pub fn new(len: usize, batch_size: usize, seed: Option<u64>) -> Result<Self> {
        if batch_size == 0 {
            return Err(SpectraError::config("batch_size", "must be at least 1"));
        }

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            batch_size,
            indices: (0..len).collect(),
            rng,
        })
    }

    /// Number of batches per epoch (the last one may be short)
    pub fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Reshuffle and split the sample indices for a new epoch
    pub fn epoch(&mut self) -> Vec<Vec<usize>> {
        self.indices.shuffle(&mut self.rng);
        self.indices
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecConfig;

    #[test]
    fn test_epoch_covers_every_sample_once() {
        let mut sampler = BatchSampler::new(10, 3, Some(7)).unwrap();
        assert_eq!(sampler.num_batches(), 4);

        let batches = sampler.epoch();
        assert_eq!(batches.len(), 4);
        assert_eq!(batches.last().unwrap().len(), 1);

        let mut seen: Vec<usize> = batches.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_seeded_order_is_reproducible() {
        let mut a = BatchSampler::new(32, 4, Some(11)).unwrap();
        let mut b = BatchSampler::new(32, 4, Some(11)).unwrap();
        assert_eq!(a.epoch(), b.epoch());
        assert_eq!(a.epoch(), b.epoch());
    }

    #[test]
    fn test_order_reshuffled_between_epochs() {
        let mut sampler = BatchSampler::new(64, 8, Some(3)).unwrap();
        let first = sampler.epoch();
        let second = sampler.epoch();
        assert_ne!(first, second);
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        assert!(BatchSampler::new(4, 0, None).is_err());
    }

    #[test]
    fn test_collate_shapes() {
        let inputs: Vec<Vec<f64>> = (0..3).map(|i| vec![i as f64; 64]).collect();
        let params: Vec<Vec<f64>> = (0..3).map(|i| vec![i as f64, 1.0]).collect();
        let targets = inputs.clone();
        let dataset =
            ConditionedDataset::new(&inputs, &params, &targets, CodecConfig::new(32).unwrap())
                .unwrap();

        let batch = Batch::collate(&dataset, &[2, 0], &Device::Cpu).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.input_magnitude.dims(), &[2, 16]);
        assert_eq!(batch.target_phase_cos.dims(), &[2, 16]);
        assert_eq!(batch.parameters.dims(), &[2, 2]);

        let first_row: Vec<f32> = batch.parameters.get(0).unwrap().to_vec1().unwrap();
        let expected = dataset.get(2).unwrap().parameters;
        assert!((first_row[0] as f64 - expected[0]).abs() < 1e-6);

        assert!(Batch::collate(&dataset, &[], &Device::Cpu).is_err());
        assert!(Batch::collate(&dataset, &[5], &Device::Cpu).is_err());
    }
}
