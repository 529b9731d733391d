//! Plain-text numeric tables
//!
//! One row per line. Fields may be separated by commas, semicolons or
//! whitespace. Blank lines and lines starting with `#` are skipped, and a
//! first line that does not parse as numbers is kept as a header.

use crate::error::SpectraError;
use crate::Result;
use std::fs;
use std::path::Path;

/// Parsed table with an optional header
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<f64>>,
}

impl Table {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.rows
            .first()
            .map(|row| row.len())
            .or_else(|| self.header.as_ref().map(|h| h.len()))
            .unwrap_or(0)
    }
}

/// Read a table from disk
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let table = parse_table(&text)?;

    log::info!(
        "Read {} rows x {} columns from {}",
        table.num_rows(),
        table.num_columns(),
        path.display()
    );
    Ok(table)
}

/// Parse table text; ragged rows and non-numeric fields are errors
pub fn parse_table(text: &str) -> Result<Table> {
    let mut header = None;
    let mut rows: Vec<Vec<f64>> = Vec::new();

    for (line_idx, line) in text.lines().enumerate() {
        let line_number = line_idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields = split_fields(trimmed);
        let parsed: std::result::Result<Vec<f64>, _> =
            fields.iter().map(|f| f.parse::<f64>()).collect();

        let row = match parsed {
            Ok(row) => row,
            Err(_) if header.is_none() && rows.is_empty() => {
                header = Some(fields.iter().map(|f| f.to_string()).collect());
                continue;
            }
            Err(e) => {
                return Err(SpectraError::Parse {
                    line: line_number,
                    reason: format!("{} in {:?}", e, trimmed),
                });
            }
        };

        if let Some(first) = rows.first() {
            if row.len() != first.len() {
                return Err(SpectraError::Parse {
                    line: line_number,
                    reason: format!("expected {} fields, found {}", first.len(), row.len()),
                });
            }
        }
        rows.push(row);
    }

    Ok(Table { header, rows })
}

fn split_fields(line: &str) -> Vec<&str> {
    line.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|field| !field.is_empty())
        .collect()
}

/// Keep only `columns` of every row, in the given order
pub fn select_columns(rows: &[Vec<f64>], columns: &[usize]) -> Result<Vec<Vec<f64>>> {
    rows.iter()
        .map(|row| {
            columns
                .iter()
                .map(|&col| {
                    row.get(col)
                        .copied()
                        .ok_or_else(|| SpectraError::shape("parameter column", row.len(), col))
                })
                .collect()
        })
        .collect()
}
