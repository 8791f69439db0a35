use std::collections::BTreeMap;

use anyhow::Result;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use crate::dataset::Dataset;

/// Goodness-of-fit metrics shared by every regressor.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RegressionMetrics {
    /// Number of rows scored.
    pub n: usize,
    /// Number of fitted coefficients, including the intercept.
    pub d: usize,
    pub sse: f64,
    pub sst: f64,
    pub r_squared: f64,
    pub adjusted_r_squared: f64,
    pub rmse: f64,
    pub mae: f64,
    /// Overall F test; absent when the degrees of freedom do not allow it.
    pub f_statistic: Option<f64>,
    pub f_pvalue: Option<f64>,
}

impl RegressionMetrics {
    /// Compare `predictions` against `target` for a model with `d` coefficients.
    pub fn compute(target: &Array1<f64>, predictions: &Array1<f64>, d: usize) -> Self {
        let n = target.len();
        let n_f = n as f64;
        let mean = if n > 0 { target.sum() / n_f } else { 0.0 };

        let residuals = target - predictions;
        let sse = residuals.mapv(|r| r * r).sum();
        let sst = target.mapv(|y| (y - mean).powi(2)).sum();
        let mae = if n > 0 {
            residuals.mapv(f64::abs).sum() / n_f
        } else {
            0.0
        };
        let rmse = if n > 0 { (sse / n_f).sqrt() } else { 0.0 };

        let r_squared = if sst > 0.0 { 1.0 - sse / sst } else { 0.0 };
        let adjusted_r_squared = if n > d && n > 1 {
            1.0 - (1.0 - r_squared) * (n_f - 1.0) / (n_f - d as f64)
        } else {
            r_squared
        };

        let (f_statistic, f_pvalue) = f_test(sse, sst, n, d);

        RegressionMetrics {
            n,
            d,
            sse,
            sst,
            r_squared,
            adjusted_r_squared,
            rmse,
            mae,
            f_statistic,
            f_pvalue,
        }
    }
}

/// F test of the regression against the intercept-only model.
fn f_test(sse: f64, sst: f64, n: usize, d: usize) -> (Option<f64>, Option<f64>) {
    if d < 2 || n <= d || sse <= 0.0 {
        return (None, None);
    }
    let df_model = (d - 1) as f64;
    let df_resid = (n - d) as f64;
    let f = ((sst - sse) / df_model) / (sse / df_resid);
    let pvalue = FisherSnedecor::new(df_model, df_resid)
        .ok()
        .map(|dist| 1.0 - dist.cdf(f.max(0.0)));
    (Some(f), pvalue)
}

/// Fitted linear coefficients keyed by feature name.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct LinearCoefficients {
    pub thetas: BTreeMap<String, f64>,
}

impl LinearCoefficients {
    pub fn from_pairs(names: &[String], values: &Array1<f64>) -> Self {
        Self {
            thetas: names.iter().cloned().zip(values.iter().copied()).collect(),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.thetas.keys().cloned().collect()
    }

    /// `X theta` over the coefficient features. Extra dataset columns are
    /// ignored; a missing one is an error.
    pub fn predict(&self, data: &Dataset) -> Result<Array1<f64>> {
        let names = self.names();
        let x = data.design_matrix_for(&names)?;
        let theta: Array1<f64> = self.thetas.values().copied().collect();
        Ok(x.dot(&theta))
    }
}
