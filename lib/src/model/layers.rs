//! Building blocks of the translator: projections, attention, encoder block

use crate::Result;
use candle_core::{Module, Tensor, D};
use candle_nn::{Init, Linear, VarBuilder};

use super::config::TranslatorConfig;

/// Linear layer with Glorot-uniform weights and a zero bias
///
/// The variance-scaling bound `sqrt(6 / (fan_in + fan_out))` keeps early
/// activations in range while the learning rate warms up.
pub fn xavier_linear(in_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Linear> {
    let bound = (6.0 / (in_dim + out_dim) as f64).sqrt();
    let weight = vb.get_with_hints(
        (out_dim, in_dim),
        "weight",
        Init::Uniform {
            lo: -bound,
            up: bound,
        },
    )?;
    let bias = vb.get_with_hints(out_dim, "bias", Init::Const(0.0))?;
    Ok(Linear::new(weight, Some(bias)))
}

/// Layer normalization over the last dimension
///
/// `(x - mean) / sqrt(var + eps) * gain + shift`, built from elementary ops
/// so gradients reach both the input and the affine parameters.
pub struct LayerNorm {
    gain: Tensor,
    shift: Tensor,
    eps: f64,
}

impl LayerNorm {
    pub fn new(size: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            gain: vb.get_with_hints(size, "weight", Init::Const(1.0))?,
            shift: vb.get_with_hints(size, "bias", Init::Const(0.0))?,
            eps,
        })
    }

    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mean = xs.mean_keepdim(D::Minus1)?;
        let centered = xs.broadcast_sub(&mean)?;
        let var = centered.sqr()?.mean_keepdim(D::Minus1)?;
        let std = (var + self.eps)?.sqrt()?;
        Ok(centered
            .broadcast_div(&std)?
            .broadcast_mul(&self.gain)?
            .broadcast_add(&self.shift)?)
    }
}

/// Dropout that is a no-op outside training
pub fn maybe_dropout(xs: &Tensor, rate: f32, train: bool) -> Result<Tensor> {
    if train && rate > 0.0 {
        Ok(candle_nn::ops::dropout(xs, rate)?)
    } else {
        Ok(xs.clone())
    }
}

/// Bidirectional multi-head self-attention over frequency bins
pub struct SelfAttention {
    query: Linear,
    key: Linear,
    value: Linear,
    output: Linear,
    num_heads: usize,
    head_dim: usize,
}

impl SelfAttention {
    pub fn new(config: &TranslatorConfig, vb: VarBuilder) -> Result<Self> {
        let d = config.d_model;
        Ok(Self {
            query: xavier_linear(d, d, vb.pp("query"))?,
            key: xavier_linear(d, d, vb.pp("key"))?,
            value: xavier_linear(d, d, vb.pp("value"))?,
            output: xavier_linear(d, d, vb.pp("output"))?,
            num_heads: config.num_heads,
            head_dim: config.head_dim(),
        })
    }

    /// `[batch, seq, d_model]` -> `[batch, seq, d_model]`, no masking
    pub fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, d_model) = hidden.dims3()?;

        let query = self.split_heads(&self.query.forward(hidden)?, batch, seq_len)?;
        let key = self.split_heads(&self.key.forward(hidden)?, batch, seq_len)?;
        let value = self.split_heads(&self.value.forward(hidden)?, batch, seq_len)?;

        // Q @ K^T / sqrt(head_dim)
        let key_t = key.transpose(2, 3)?.contiguous()?;
        let scores = (query.matmul(&key_t)? / (self.head_dim as f64).sqrt())?;
        let probs = candle_nn::ops::softmax(&scores, D::Minus1)?;

        let context = probs
            .matmul(&value)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, seq_len, d_model))?;

        Ok(self.output.forward(&context)?)
    }

    /// `[batch, seq, d_model]` -> `[batch, heads, seq, head_dim]`
    fn split_heads(&self, xs: &Tensor, batch: usize, seq_len: usize) -> Result<Tensor> {
        Ok(xs
            .reshape((batch, seq_len, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?)
    }
}

/// Pre-norm encoder block: attention and GELU feedforward, each residual
pub struct EncoderBlock {
    attention_norm: LayerNorm,
    attention: SelfAttention,
    feedforward_norm: LayerNorm,
    feedforward_in: Linear,
    feedforward_out: Linear,
    dropout: f32,
}

impl EncoderBlock {
    pub fn new(config: &TranslatorConfig, vb: VarBuilder) -> Result<Self> {
        let d = config.d_model;
        Ok(Self {
            attention_norm: LayerNorm::new(d, config.layer_norm_eps, vb.pp("attention_norm"))?,
            attention: SelfAttention::new(config, vb.pp("attention"))?,
            feedforward_norm: LayerNorm::new(d, config.layer_norm_eps, vb.pp("feedforward_norm"))?,
            feedforward_in: xavier_linear(d, config.ff_dim, vb.pp("feedforward_in"))?,
            feedforward_out: xavier_linear(config.ff_dim, d, vb.pp("feedforward_out"))?,
            dropout: config.dropout,
        })
    }

    pub fn forward(&self, hidden: &Tensor, train: bool) -> Result<Tensor> {
        let attended = self
            .attention
            .forward(&self.attention_norm.forward(hidden)?)?;
        let hidden = hidden.add(&maybe_dropout(&attended, self.dropout, train)?)?;

        let expanded = self
            .feedforward_in
            .forward(&self.feedforward_norm.forward(&hidden)?)?
            .gelu()?;
        let expanded = maybe_dropout(&expanded, self.dropout, train)?;
        let projected = self.feedforward_out.forward(&expanded)?;

        Ok(hidden.add(&maybe_dropout(&projected, self.dropout, train)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn small_config() -> TranslatorConfig {
        TranslatorConfig {
            num_bins: 6,
            num_parameters: 2,
            d_model: 8,
            num_heads: 2,
            num_layers: 1,
            ff_dim: 16,
            dropout: 0.0,
            ..TranslatorConfig::default()
        }
    }

    #[test]
    fn test_xavier_bounds_and_zero_bias() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let layer = xavier_linear(10, 30, vb.pp("proj")).unwrap();

        let bound = (6.0f32 / 40.0).sqrt();
        let weights: Vec<f32> = layer.weight().flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(weights.len(), 300);
        assert!(weights.iter().all(|w| w.abs() <= bound));
        assert!(weights.iter().any(|w| w.abs() > 0.0));

        let bias: Vec<f32> = layer.bias().unwrap().to_vec1().unwrap();
        assert!(bias.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_layer_norm_statistics() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let norm = LayerNorm::new(4, 1e-5, vb).unwrap();

        let xs = Tensor::new(&[[1f32, 2.0, 3.0, 4.0], [10.0, 10.0, 10.0, 10.0]], &Device::Cpu).unwrap();
        let rows: Vec<Vec<f32>> = norm.forward(&xs).unwrap().to_vec2().unwrap();

        let mean: f32 = rows[0].iter().sum::<f32>() / 4.0;
        let var: f32 = rows[0].iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-3);
        // Constant row collapses to the shift
        assert!(rows[1].iter().all(|v| v.abs() < 1e-3));
    }

    #[test]
    fn test_attention_preserves_shape() {
        let config = small_config();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let attention = SelfAttention::new(&config, vb).unwrap();

        let hidden = Tensor::randn(0f32, 1.0, (3, 6, 8), &Device::Cpu).unwrap();
        let out = attention.forward(&hidden).unwrap();
        assert_eq!(out.dims(), &[3, 6, 8]);
    }

    #[test]
    fn test_encoder_block_is_deterministic_without_dropout() {
        let config = small_config();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let block = EncoderBlock::new(&config, vb).unwrap();

        let hidden = Tensor::randn(0f32, 1.0, (2, 6, 8), &Device::Cpu).unwrap();
        let a: Vec<f32> = block.forward(&hidden, true).unwrap().flatten_all().unwrap().to_vec1().unwrap();
        let b: Vec<f32> = block.forward(&hidden, false).unwrap().flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.is_finite()));
    }
}
