use anyhow::Result;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::config::RegressorParameters;
use crate::dataset::Dataset;
use crate::error::StepwiseError;
use crate::models::regressor_trait::Regressor;
use crate::models::utils::{LinearCoefficients, RegressionMetrics};
use crate::storage::ModelContext;

const MODEL_KEY: &str = "nlms.model";

/// Guards the normalization step against all-zero rows.
const NORM_EPSILON: f64 = 1e-8;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct NlmsParams {
    pub learning_rate: f64,
    pub epochs: usize,
}

impl Default for NlmsParams {
    fn default() -> Self {
        NlmsParams {
            learning_rate: 0.1,
            epochs: 1000,
        }
    }
}

/// Online linear regression trained with normalized least mean squares.
///
/// It has no notion of coefficient uncertainty, so it does not implement
/// `StepwiseCompatible` and cannot be used as a stepwise delegate.
pub struct NlmsRegression {
    context: ModelContext,
    model: Option<LinearCoefficients>,
}

impl NlmsRegression {
    pub fn new(context: ModelContext) -> Self {
        NlmsRegression {
            context,
            model: None,
        }
    }

    fn ensure_model(&mut self) -> Result<&LinearCoefficients> {
        if self.model.is_none() {
            let state = self
                .context
                .load::<LinearCoefficients>(MODEL_KEY)?
                .ok_or(StepwiseError::NotFitted)?;
            self.model = Some(state);
        }
        self.model.as_ref().ok_or_else(|| StepwiseError::NotFitted.into())
    }
}

impl Regressor for NlmsRegression {
    fn fit(&mut self, data: &Dataset, params: &RegressorParameters) -> Result<()> {
        let params: NlmsParams = params.decode()?;
        if !(params.learning_rate > 0.0 && params.learning_rate < 2.0) {
            return Err(StepwiseError::Configuration(format!(
                "NLMS learning_rate must lie in (0, 2), got {}",
                params.learning_rate
            ))
            .into());
        }

        let (names, x) = data.design_matrix();
        let y = data.target();
        let mut theta = Array1::<f64>::zeros(names.len());

        for _ in 0..params.epochs {
            for (row, &target) in x.outer_iter().zip(y.iter()) {
                let error = target - row.dot(&theta);
                let norm = row.dot(&row) + NORM_EPSILON;
                theta.scaled_add(params.learning_rate * error / norm, &row);
            }
        }

        let model = LinearCoefficients::from_pairs(&names, &theta);
        self.context.save(MODEL_KEY, &model)?;
        self.model = Some(model);
        Ok(())
    }

    fn predict(&mut self, data: &mut Dataset) -> Result<()> {
        let predictions = self.ensure_model()?.predict(data)?;
        data.set_predictions(predictions)
    }

    fn validate(&mut self, data: &Dataset) -> Result<RegressionMetrics> {
        let model = self.ensure_model()?;
        let predictions = model.predict(data)?;
        Ok(RegressionMetrics::compute(
            data.target(),
            &predictions,
            model.thetas.len(),
        ))
    }

    fn erase(&mut self) -> Result<()> {
        self.model = None;
        self.context.remove(MODEL_KEY)
    }

    fn name(&self) -> &str {
        "nlms"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageConfig;

    #[test]
    fn test_nlms_converges_on_noiseless_line() {
        let a: Vec<f64> = (0..20).map(|i| i as f64 / 10.0).collect();
        let y: Vec<f64> = a.iter().map(|a| 0.5 + 1.5 * a).collect();
        let data = Dataset::new(y).with_column("a", a).unwrap().with_constant();

        let ctx = ModelContext::from_config("nlms-unit", &StorageConfig::InMemory).unwrap();
        let mut model = NlmsRegression::new(ctx);
        model.fit(&data, &RegressorParameters::default()).unwrap();

        let metrics = model.validate(&data).unwrap();
        assert!(metrics.rmse < 1e-3, "rmse too large: {}", metrics.rmse);
    }

    #[test]
    fn test_nlms_rejects_unstable_rate() {
        let data = Dataset::new(vec![1.0, 2.0]).with_constant();
        let ctx = ModelContext::from_config("nlms-unit", &StorageConfig::InMemory).unwrap();
        let mut model = NlmsRegression::new(ctx);
        let params = RegressorParameters::new(serde_json::json!({"learning_rate": 2.5}));
        assert!(model.fit(&data, &params).is_err());
    }
}
