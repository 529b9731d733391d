//! Fixed sinusoidal position table

use crate::Result;
use candle_core::{Device, Tensor};

/// `[1, seq_len, d_model]` table: sin on even dims, cos on odd dims
///
/// Frequencies follow `10000^(-2i / d_model)`; nothing here is learned.
pub fn sinusoidal_table(seq_len: usize, d_model: usize, device: &Device) -> Result<Tensor> {
    let mut table = vec![0f32; seq_len * d_model];

    for pos in 0..seq_len {
        for pair in 0..d_model.div_ceil(2) {
            let rate = 10000f64.powf(-((2 * pair) as f64) / d_model as f64);
            let angle = pos as f64 * rate;
            let row = pos * d_model;
            table[row + 2 * pair] = angle.sin() as f32;
            if 2 * pair + 1 < d_model {
                table[row + 2 * pair + 1] = angle.cos() as f32;
            }
        }
    }

    Ok(Tensor::from_vec(table, (1, seq_len, d_model), device)?)
}
