//! Utility functions for loading data and formatting results
//!
//! Helpers used by client applications to go from table files to a dataset
//! and to print human-readable summaries.

use crate::codec::CodecConfig;
use crate::dataset::{ConditionedDataset, ParameterStats};
use crate::error::SpectraError;
use crate::model::SpectralTranslator;
use crate::table_io::{read_table, select_columns};
use crate::training::LossHistory;
use crate::Result;
use std::path::Path;

/// Table files making up one dataset
#[derive(Debug, Clone, Copy)]
pub struct DatasetFiles<'a> {
    /// One input signal per row
    pub input: &'a Path,
    /// One target signal per row
    pub target: &'a Path,
    /// One parameter vector per row
    pub params: &'a Path,
}

/// Read the three tables and encode them into a dataset
///
/// Only `columns` of the parameter table are used. With `parameter_stats`
/// set, parameters are normalized with those statistics (evaluation on new
/// data); otherwise they are computed from this table.
pub fn load_dataset(
    files: DatasetFiles<'_>,
    columns: &[usize],
    config: CodecConfig,
    parameter_stats: Option<ParameterStats>,
) -> Result<ConditionedDataset> {
    let inputs = read_table(files.input)?.rows;
    let targets = read_table(files.target)?.rows;
    let params = select_columns(&read_table(files.params)?.rows, columns)?;

    let dataset = match parameter_stats {
        Some(stats) => {
            ConditionedDataset::with_parameter_stats(&inputs, &params, &targets, config, stats)?
        }
        None => ConditionedDataset::new(&inputs, &params, &targets, config)?,
    };

    log::info!(
        "Dataset ready: {} samples, {} bins, {} parameters",
        dataset.len(),
        dataset.num_bins(),
        dataset.num_parameters()
    );
    Ok(dataset)
}

/// Parse a column list such as `0,1,2` or `3 5`
pub fn parse_columns(spec: &str) -> Result<Vec<usize>> {
    let columns = spec
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<usize>().map_err(|e| {
                SpectraError::config("columns", format!("{:?} is not a column index: {}", part, e))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if columns.is_empty() {
        return Err(SpectraError::config("columns", "at least one column is required"));
    }
    Ok(columns)
}

/// Format time in seconds to human-readable string
pub fn format_time(time_sec: f64) -> String {
    if time_sec >= 60.0 {
        let minutes = (time_sec / 60.0).floor();
        let seconds = time_sec % 60.0;
        format!("{:.0}m {:.1}s", minutes, seconds)
    } else {
        format!("{:.2}s", time_sec)
    }
}

/// Describe a dataset and the model that will be trained on it
pub fn training_summary(dataset: &ConditionedDataset, model: &SpectralTranslator) -> String {
    let mut summary = String::new();

    summary.push_str(&format!("Dataset: {} samples\n", dataset.len()));
    summary.push_str(&format!(
        "  Signal length: {} -> {} points\n",
        dataset.resample_index().original_length(),
        dataset.target_length()
    ));
    summary.push_str(&format!("  Frequency bins: {}\n", dataset.num_bins()));
    summary.push_str(&format!("  Parameters: {}\n", dataset.num_parameters()));

    let config = model.config();
    summary.push_str("Translator:\n");
    summary.push_str(&format!("  Model width: {}\n", config.d_model));
    summary.push_str(&format!(
        "  Attention: {} heads x {} layers\n",
        config.num_heads, config.num_layers
    ));
    summary.push_str(&format!("  Feedforward width: {}\n", config.ff_dim));
    summary.push_str(&format!("  Dropout: {}\n", config.dropout));
    summary.push_str(&format!("  Trainable values: {}\n", model.num_parameters()));

    summary
}

/// One line per epoch, plus the best epoch
pub fn history_summary(history: &LossHistory) -> String {
    let mut summary = String::new();

    for epoch in history.epochs() {
        summary.push_str(&format!(
            "  Epoch {:>3}: loss {:.6} (magnitude {:.6}, phase {:.6}) lr {:.2e}\n",
            epoch.epoch, epoch.total, epoch.magnitude, epoch.phase, epoch.learning_rate
        ));
    }

    match history.best() {
        Some(best) => summary.push_str(&format!(
            "Best loss {:.6} at epoch {}\n",
            best.total, best.epoch
        )),
        None => summary.push_str("No finite loss recorded\n"),
    }

    summary
}
