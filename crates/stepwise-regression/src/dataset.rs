//! Column-oriented regression dataset.
//!
//! `Dataset` owns every column, the response and the optional prediction
//! vector, so `clone()` is a full deep copy: mutating the copy never touches
//! the original. The stepwise orchestrator relies on this to eliminate
//! features on a private working copy.
use std::collections::BTreeMap;

use anyhow::Result;
use ndarray::{Array1, Array2};

use crate::error::StepwiseError;

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Feature columns keyed by name. Ordered so that design matrices and
    /// p-value reports are deterministic.
    columns: BTreeMap<String, Array1<f64>>,
    /// Response variable, one value per row.
    target: Array1<f64>,
    /// Written by a regressor's `predict`.
    predictions: Option<Array1<f64>>,
}

impl Dataset {
    /// Name of the synthetic intercept column. It is never eliminated.
    pub const CONSTANT_COLUMN: &'static str = "(constant)";

    pub fn new(target: Vec<f64>) -> Self {
        Dataset {
            columns: BTreeMap::new(),
            target: Array1::from_vec(target),
            predictions: None,
        }
    }

    /// Builder-style `add_column`.
    pub fn with_column(mut self, name: &str, values: Vec<f64>) -> Result<Self> {
        self.add_column(name, values)?;
        Ok(self)
    }

    /// Builder-style `add_constant_column`.
    pub fn with_constant(mut self) -> Self {
        self.add_constant_column();
        self
    }

    /// Insert or replace a feature column. Its length must match the target.
    pub fn add_column(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.row_count() {
            return Err(StepwiseError::LengthMismatch {
                expected: self.row_count(),
                found: values.len(),
            }
            .into());
        }
        self.columns.insert(name.to_string(), Array1::from_vec(values));
        Ok(())
    }

    /// Add the intercept column (all ones).
    pub fn add_constant_column(&mut self) {
        self.columns.insert(
            Self::CONSTANT_COLUMN.to_string(),
            Array1::from_elem(self.row_count(), 1.0),
        );
    }

    pub fn has_constant(&self) -> bool {
        self.columns.contains_key(Self::CONSTANT_COLUMN)
    }

    /// Remove a column, returning its values if it was present.
    pub fn remove_column(&mut self, name: &str) -> Option<Array1<f64>> {
        self.columns.remove(name)
    }

    /// Number of columns, including the constant column when present.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&Array1<f64>> {
        self.columns.get(name)
    }

    /// Column names in their stable (sorted) order.
    pub fn feature_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn target(&self) -> &Array1<f64> {
        &self.target
    }

    pub fn predictions(&self) -> Option<&Array1<f64>> {
        self.predictions.as_ref()
    }

    pub fn set_predictions(&mut self, predictions: Array1<f64>) -> Result<()> {
        if predictions.len() != self.row_count() {
            return Err(StepwiseError::LengthMismatch {
                expected: self.row_count(),
                found: predictions.len(),
            }
            .into());
        }
        self.predictions = Some(predictions);
        Ok(())
    }

    /// Row-major design matrix over `names`, in the given order.
    pub fn design_matrix_for(&self, names: &[String]) -> Result<Array2<f64>> {
        let n_rows = self.row_count();
        let mut x = Array2::zeros((n_rows, names.len()));
        for (j, name) in names.iter().enumerate() {
            let column = self
                .columns
                .get(name)
                .ok_or_else(|| StepwiseError::UnknownColumn(name.clone()))?;
            x.column_mut(j).assign(column);
        }
        Ok(x)
    }

    /// Design matrix over every column plus the names of its columns.
    pub fn design_matrix(&self) -> (Vec<String>, Array2<f64>) {
        let names = self.feature_names();
        let mut x = Array2::zeros((self.row_count(), names.len()));
        for (j, column) in self.columns.values().enumerate() {
            x.column_mut(j).assign(column);
        }
        (names, x)
    }

    pub fn log_summary(&self) {
        log::info!(
            "Dataset: {} rows, {} columns (constant column {})",
            self.row_count(),
            self.column_count(),
            if self.has_constant() { "present" } else { "absent" }
        );
    }
}
