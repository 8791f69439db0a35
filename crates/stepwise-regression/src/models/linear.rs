use std::collections::BTreeMap;

use anyhow::Result;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::config::RegressorParameters;
use crate::dataset::Dataset;
use crate::error::StepwiseError;
use crate::math::{gram, invert};
use crate::models::regressor_trait::{PvalueReport, Regressor, StepwiseCompatible};
use crate::models::utils::{LinearCoefficients, RegressionMetrics};
use crate::storage::ModelContext;

const MODEL_KEY: &str = "matrix_linear_regression.model";

/// Ordinary least squares has no hyper-parameters; the struct exists so the
/// regressor still validates whatever it is handed.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MatrixLinearRegressionParams {}

/// Persisted state of a fitted least-squares model.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LinearModelState {
    pub coefficients: LinearCoefficients,
    pub standard_errors: BTreeMap<String, f64>,
    pub pvalues: PvalueReport,
    /// Residual degrees of freedom, `n - d`.
    pub dfree: usize,
    pub n: usize,
    pub d: usize,
}

/// Linear regression solved with the normal equations.
///
/// Reports a two-sided Student-t p-value for every coefficient, which makes it
/// usable as a stepwise delegate.
pub struct MatrixLinearRegression {
    context: ModelContext,
    model: Option<LinearModelState>,
}

impl MatrixLinearRegression {
    pub fn new(context: ModelContext) -> Self {
        MatrixLinearRegression {
            context,
            model: None,
        }
    }

    /// The in-memory model, reloading it from storage if needed.
    fn ensure_model(&mut self) -> Result<&LinearModelState> {
        if self.model.is_none() {
            log::trace!(
                "Loading {} from storage '{}'",
                MODEL_KEY,
                self.context.db_name()
            );
            let state = self
                .context
                .load::<LinearModelState>(MODEL_KEY)?
                .ok_or(StepwiseError::NotFitted)?;
            self.model = Some(state);
        }
        self.model.as_ref().ok_or_else(|| StepwiseError::NotFitted.into())
    }
}

/// Least-squares estimates, standard errors and p-values for `data`.
pub fn ordinary_least_squares(data: &Dataset) -> Result<LinearModelState> {
    let (names, x) = data.design_matrix();
    let y = data.target();
    let n = data.row_count();
    let d = names.len();

    if n <= d {
        return Err(StepwiseError::InsufficientDegreesOfFreedom {
            samples: n,
            features: d,
        }
        .into());
    }

    let xtx_inv = invert(&gram(&x))?;
    let theta: Array1<f64> = xtx_inv.dot(&x.t().dot(y));

    let residuals = y - &x.dot(&theta);
    let dfree = n - d;
    let sigma2 = residuals.mapv(|r| r * r).sum() / dfree as f64;

    let t_dist = StudentsT::new(0.0, 1.0, dfree as f64)
        .map_err(|e| anyhow::anyhow!("Failed to build t distribution: {}", e))?;

    let mut standard_errors = BTreeMap::new();
    let mut pvalues = BTreeMap::new();
    for (j, name) in names.iter().enumerate() {
        let se = (sigma2 * xtx_inv[(j, j)]).max(0.0).sqrt();
        let pvalue = if se > 0.0 {
            let t = theta[j] / se;
            2.0 * (1.0 - t_dist.cdf(t.abs()))
        } else if theta[j] == 0.0 {
            1.0
        } else {
            // exact fit: the coefficient is known without error
            0.0
        };
        standard_errors.insert(name.clone(), se);
        pvalues.insert(name.clone(), pvalue.clamp(0.0, 1.0));
    }

    Ok(LinearModelState {
        coefficients: LinearCoefficients::from_pairs(&names, &theta),
        standard_errors,
        pvalues: PvalueReport::new(pvalues),
        dfree,
        n,
        d,
    })
}

impl Regressor for MatrixLinearRegression {
    fn fit(&mut self, data: &Dataset, params: &RegressorParameters) -> Result<()> {
        let _params: MatrixLinearRegressionParams = params.decode()?;
        let state = ordinary_least_squares(data)?;
        log::trace!(
            "Fitted least squares on {} rows x {} columns ({} residual df)",
            state.n,
            state.d,
            state.dfree
        );
        self.context.save(MODEL_KEY, &state)?;
        self.model = Some(state);
        Ok(())
    }

    fn predict(&mut self, data: &mut Dataset) -> Result<()> {
        let predictions = self.ensure_model()?.coefficients.predict(data)?;
        data.set_predictions(predictions)
    }

    fn validate(&mut self, data: &Dataset) -> Result<RegressionMetrics> {
        let model = self.ensure_model()?;
        let predictions = model.coefficients.predict(data)?;
        Ok(RegressionMetrics::compute(data.target(), &predictions, model.d))
    }

    fn erase(&mut self) -> Result<()> {
        self.model = None;
        self.context.remove(MODEL_KEY)
    }

    fn name(&self) -> &str {
        "matrix_linear_regression"
    }
}

impl StepwiseCompatible for MatrixLinearRegression {
    fn feature_pvalues(&self) -> Result<PvalueReport> {
        self.model
            .as_ref()
            .map(|m| m.pvalues.clone())
            .ok_or_else(|| StepwiseError::NotFitted.into())
    }
}
