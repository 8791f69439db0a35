use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::RegressorParameters;
use crate::dataset::Dataset;
use crate::models::utils::RegressionMetrics;

/// Contract every pluggable regression algorithm implements.
///
/// A regressor is bound to a storage context when it is constructed. `fit`
/// persists whatever the regressor needs to predict later; `predict` and
/// `validate` reload that state on demand, and `erase` removes it.
pub trait Regressor {
    /// Train on every column of `data` against its target.
    fn fit(&mut self, data: &Dataset, params: &RegressorParameters) -> Result<()>;

    /// Write predictions into `data` in place.
    fn predict(&mut self, data: &mut Dataset) -> Result<()>;

    /// Score the trained model against the targets of `data`.
    fn validate(&mut self, data: &Dataset) -> Result<RegressionMetrics>;

    /// Release in-memory and persisted state owned by this regressor.
    fn erase(&mut self) -> Result<()>;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "regressor"
    }
}

/// Regressors that can drive backward elimination.
///
/// After a completed `fit`, `feature_pvalues` returns the two-sided p-value of
/// each fitted coefficient.
pub trait StepwiseCompatible: Regressor {
    fn feature_pvalues(&self) -> Result<PvalueReport>;
}

/// Immutable snapshot of per-feature p-values from one fit.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct PvalueReport {
    pvalues: BTreeMap<String, f64>,
}

impl PvalueReport {
    pub fn new(pvalues: BTreeMap<String, f64>) -> Self {
        Self { pvalues }
    }

    pub fn is_empty(&self) -> bool {
        self.pvalues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pvalues.len()
    }

    pub fn get(&self, feature: &str) -> Option<f64> {
        self.pvalues.get(feature).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.pvalues.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// The feature with the largest p-value, ignoring `excluded`.
    ///
    /// Ties go to the feature whose name sorts first. NaN compares above every
    /// number, so a feature without a usable p-value is picked first.
    pub fn least_significant(&self, excluded: &str) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (feature, pvalue) in self.iter() {
            if feature == excluded {
                continue;
            }
            match best {
                Some((_, best_p)) if pvalue.total_cmp(&best_p).is_le() => {}
                _ => best = Some((feature, pvalue)),
            }
        }
        best
    }
}

impl FromIterator<(String, f64)> for PvalueReport {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
