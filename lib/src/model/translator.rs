//! Parameter-conditioned spectral translator

use super::config::TranslatorConfig;
use super::layers::{maybe_dropout, xavier_linear, EncoderBlock, LayerNorm};
use super::positional::sinusoidal_table;
use crate::error::SpectraError;
use crate::Result;
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Linear, VarBuilder, VarMap};
use std::path::Path;

/// Predicted target spectrum, each stream `[batch, bins]`
#[derive(Debug, Clone)]
pub struct TranslatorOutput {
    pub magnitude: Tensor,
    pub phase_sin: Tensor,
    pub phase_cos: Tensor,
}

/// Attention model mapping an input spectrum and parameters to a target spectrum
///
/// Each bin is a token. The three per-bin streams and the parameter vector
/// are embedded separately and summed, a fixed positional table is added,
/// and a stack of pre-norm encoder blocks attends across all bins. Three
/// linear heads read out magnitude, sin and cos; the (sin, cos) pair is then
/// rescaled onto the unit circle.
pub struct SpectralTranslator {
    config: TranslatorConfig,
    device: Device,
    varmap: VarMap,
    magnitude_embed: Linear,
    sin_embed: Linear,
    cos_embed: Linear,
    parameter_embed: Linear,
    positional: Tensor,
    blocks: Vec<EncoderBlock>,
    final_norm: LayerNorm,
    magnitude_head: Linear,
    sin_head: Linear,
    cos_head: Linear,
}

impl SpectralTranslator {
    /// Build a freshly initialized translator on `device`
    pub fn new(config: TranslatorConfig, device: &Device) -> Result<Self> {
        config.validate()?;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let d = config.d_model;

        let blocks = (0..config.num_layers)
            .map(|layer| EncoderBlock::new(&config, vb.pp(format!("blocks.{}", layer))))
            .collect::<Result<Vec<_>>>()?;

        let model = Self {
            magnitude_embed: xavier_linear(1, d, vb.pp("magnitude_embed"))?,
            sin_embed: xavier_linear(1, d, vb.pp("sin_embed"))?,
            cos_embed: xavier_linear(1, d, vb.pp("cos_embed"))?,
            parameter_embed: xavier_linear(config.num_parameters, d, vb.pp("parameter_embed"))?,
            positional: sinusoidal_table(config.num_bins, d, device)?,
            blocks,
            final_norm: LayerNorm::new(d, config.layer_norm_eps, vb.pp("final_norm"))?,
            magnitude_head: xavier_linear(d, 1, vb.pp("magnitude_head"))?,
            sin_head: xavier_linear(d, 1, vb.pp("sin_head"))?,
            cos_head: xavier_linear(d, 1, vb.pp("cos_head"))?,
            device: device.clone(),
            varmap,
            config,
        };

        log::info!(
            "Translator initialized: {} bins, d_model {}, {} heads, {} layers, {} parameters",
            model.config.num_bins,
            model.config.d_model,
            model.config.num_heads,
            model.config.num_layers,
            model.num_parameters()
        );

        Ok(model)
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Variable store holding every trainable tensor
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Total count of trainable scalars
    pub fn num_parameters(&self) -> usize {
        self.varmap
            .all_vars()
            .iter()
            .map(|var| var.elem_count())
            .sum()
    }

    /// Run the model on a batch
    ///
    /// `magnitude`, `phase_sin` and `phase_cos` are `[batch, bins]` with
    /// normalized magnitudes; `parameters` is `[batch, num_parameters]`.
    /// Dropout is active only when `train` is set.
    pub fn forward(
        &self,
        magnitude: &Tensor,
        phase_sin: &Tensor,
        phase_cos: &Tensor,
        parameters: &Tensor,
        train: bool,
    ) -> Result<TranslatorOutput> {
        let (batch, bins) = magnitude.dims2()?;
        self.check_inputs(batch, bins, phase_sin, phase_cos, parameters)?;

        // [batch, bins] -> [batch, bins, 1] so each bin is a token
        let embed = |layer: &Linear, stream: &Tensor| -> Result<Tensor> {
            Ok(layer.forward(&stream.unsqueeze(2)?)?)
        };

        // Parameter embedding is shared by every token
        let conditioning = self.parameter_embed.forward(parameters)?.unsqueeze(1)?;

        let mut hidden = embed(&self.magnitude_embed, magnitude)?
            .add(&embed(&self.sin_embed, phase_sin)?)?
            .add(&embed(&self.cos_embed, phase_cos)?)?
            .broadcast_add(&conditioning)?
            .broadcast_add(&self.positional)?;
        hidden = maybe_dropout(&hidden, self.config.dropout, train)?;

        for block in &self.blocks {
            hidden = block.forward(&hidden, train)?;
        }
        let hidden = self.final_norm.forward(&hidden)?;

        let magnitude = self.magnitude_head.forward(&hidden)?.squeeze(2)?;
        let raw_sin = self.sin_head.forward(&hidden)?.squeeze(2)?;
        let raw_cos = self.cos_head.forward(&hidden)?.squeeze(2)?;

        let norm = (raw_sin.sqr()? + raw_cos.sqr()?)?
            .sqrt()?
            .affine(1.0, self.config.phase_eps)?;

        Ok(TranslatorOutput {
            magnitude,
            phase_sin: raw_sin.div(&norm)?,
            phase_cos: raw_cos.div(&norm)?,
        })
    }

    fn check_inputs(
        &self,
        batch: usize,
        bins: usize,
        phase_sin: &Tensor,
        phase_cos: &Tensor,
        parameters: &Tensor,
    ) -> Result<()> {
        if bins != self.config.num_bins {
            return Err(SpectraError::shape("frequency bins", self.config.num_bins, bins));
        }

        for (name, stream) in [("phase sin", phase_sin), ("phase cos", phase_cos)] {
            let (rows, cols) = stream.dims2()?;
            if rows != batch || cols != bins {
                return Err(SpectraError::shape(name, batch * bins, rows * cols));
            }
        }

        let (rows, width) = parameters.dims2()?;
        if rows != batch {
            return Err(SpectraError::shape("parameter rows", batch, rows));
        }
        if width != self.config.num_parameters {
            return Err(SpectraError::shape(
                "parameter width",
                self.config.num_parameters,
                width,
            ));
        }

        Ok(())
    }

    /// Write every trainable tensor to a safetensors file, keyed by variable path
    pub fn save_weights<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.varmap.save(path)?;
        log::debug!(
            "Saved {} weight tensors to {}",
            self.varmap.all_vars().len(),
            path.display()
        );
        Ok(())
    }

    /// Overwrite trainable tensors in place from a safetensors file
    ///
    /// Every variable of the model must be present in the file with the same
    /// shape; a file written by a differently sized model is rejected.
    pub fn load_weights<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.varmap.load(path)?;
        log::debug!(
            "Loaded {} weight tensors from {}",
            self.varmap.all_vars().len(),
            path.display()
        );
        Ok(())
    }
}
