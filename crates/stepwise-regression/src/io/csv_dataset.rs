//! Delimited-text reader for regression datasets.
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;

use crate::dataset::Dataset;

/// Configuration for reading a regression dataset from CSV/TSV.
#[derive(Debug, Clone)]
pub struct CsvReaderConfig {
    /// Column holding the response variable.
    pub target_column: String,
    /// Optional list of feature columns to load.
    /// When `None`, every other column except `ignore_columns` is a feature.
    pub feature_columns: Option<Vec<String>>,
    /// Columns to skip when auto-selecting features.
    pub ignore_columns: Vec<String>,
    pub delimiter: u8,
    /// Append the constant (intercept) column.
    pub add_constant: bool,
}

impl Default for CsvReaderConfig {
    fn default() -> Self {
        Self {
            target_column: "y".to_string(),
            feature_columns: None,
            ignore_columns: vec!["id".to_string(), "row".to_string()],
            delimiter: b',',
            add_constant: true,
        }
    }
}

impl CsvReaderConfig {
    /// Default settings with a tab delimiter when `path` ends in `.tsv`.
    pub fn for_path<P: AsRef<Path>>(path: P) -> Self {
        let is_tsv = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("tsv"));
        Self {
            delimiter: if is_tsv { b'\t' } else { b',' },
            ..Self::default()
        }
    }
}

/// Read a dataset with default settings for the file's extension.
pub fn read_dataset_csv<P: AsRef<Path>>(path: P, target_column: &str) -> Result<Dataset> {
    let config = CsvReaderConfig {
        target_column: target_column.to_string(),
        ..CsvReaderConfig::for_path(&path)
    };
    read_dataset_csv_with_config(path, &config)
}

pub fn read_dataset_csv_with_config<P: AsRef<Path>>(
    path: P,
    config: &CsvReaderConfig,
) -> Result<Dataset> {
    let file = std::fs::File::open(&path)
        .with_context(|| format!("Failed to open dataset file: {}", path.as_ref().display()))?;
    read_dataset(file, config)
}

/// Read a dataset from any reader; the first row must be a header.
pub fn read_dataset<R: Read>(input: R, config: &CsvReaderConfig) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .context("Failed to read dataset header row")?
        .clone();

    let target_idx = find_column(&headers, &config.target_column)
        .ok_or_else(|| anyhow!("Missing target column '{}'", config.target_column))?;

    let feature_indices = resolve_feature_indices(&headers, config, target_idx)?;

    let mut target = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); feature_indices.len()];

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        target.push(parse_value(&record, &headers, target_idx, row_idx)?);
        for (column, &idx) in columns.iter_mut().zip(&feature_indices) {
            column.push(parse_value(&record, &headers, idx, row_idx)?);
        }
    }

    let mut data = Dataset::new(target);
    for (values, &idx) in columns.into_iter().zip(&feature_indices) {
        data.add_column(headers.get(idx).unwrap_or_default(), values)?;
    }
    if config.add_constant {
        data.add_constant_column();
    }

    log::debug!(
        "Read {} rows with {} feature columns",
        data.row_count(),
        feature_indices.len()
    );
    Ok(data)
}

fn parse_value(
    record: &StringRecord,
    headers: &StringRecord,
    idx: usize,
    row_idx: usize,
) -> Result<f64> {
    let value = record
        .get(idx)
        .ok_or_else(|| anyhow!("Missing value at row {}", row_idx + 1))?;
    value.parse::<f64>().with_context(|| {
        format!(
            "Invalid value '{}' for '{}' at row {}",
            value,
            headers.get(idx).unwrap_or(""),
            row_idx + 1
        )
    })
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case(name))
}

fn resolve_feature_indices(
    headers: &StringRecord,
    config: &CsvReaderConfig,
    target_idx: usize,
) -> Result<Vec<usize>> {
    if let Some(names) = &config.feature_columns {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = find_column(headers, name)
                .ok_or_else(|| anyhow!("Missing feature column '{}'", name))?;
            indices.push(idx);
        }
        return Ok(indices);
    }

    let ignore: HashSet<String> = config
        .ignore_columns
        .iter()
        .map(|name| name.to_ascii_lowercase())
        .collect();

    Ok(headers
        .iter()
        .enumerate()
        .filter(|&(idx, header)| idx != target_idx && !ignore.contains(&header.to_ascii_lowercase()))
        .map(|(idx, _)| idx)
        .collect())
}
