use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StepwiseError;
use crate::models::factory::RegressorRegistry;

/// Default significance threshold (`aout`) for removing a feature.
pub const DEFAULT_AOUT: f64 = 0.05;

/// Identifies which regression algorithm to instantiate.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RegressorKind {
    /// Ordinary least squares with coefficient p-values.
    MatrixLinearRegression,
    /// Normalized least-mean-squares; reports no p-values.
    Nlms,
    /// A regressor registered by the caller under its own name.
    Custom(String),
}

impl fmt::Display for RegressorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RegressorKind::MatrixLinearRegression => write!(f, "matrix_linear_regression"),
            RegressorKind::Nlms => write!(f, "nlms"),
            RegressorKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for RegressorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "matrix_linear_regression" | "ols" => Ok(RegressorKind::MatrixLinearRegression),
            "nlms" => Ok(RegressorKind::Nlms),
            _ => Err(format!(
                "Unknown regressor kind: {}. Custom regressors must be registered and selected with RegressorKind::Custom",
                s
            )),
        }
    }
}

/// Regressor-specific hyper-parameters, passed through untouched.
///
/// The orchestrator never inspects these; each regressor decodes the shape it
/// expects with [`RegressorParameters::decode`].
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct RegressorParameters(serde_json::Value);

impl RegressorParameters {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Decode into the regressor's own parameter type. Null means defaults.
    pub fn decode<T: DeserializeOwned + Default>(&self) -> Result<T> {
        if self.0.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(self.0.clone()).map_err(|e| {
            StepwiseError::Configuration(format!("Invalid regressor parameters: {}", e)).into()
        })
    }
}

/// Training configuration of the stepwise orchestrator.
///
/// Every setter validates its input; the regressor kind is checked against a
/// registry for p-value support when it is set, not when the model is fitted.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct StepwiseParameters {
    regressor_kind: Option<RegressorKind>,
    regressor_parameters: RegressorParameters,
    max_iterations: Option<usize>,
    aout: f64,
}

impl Default for StepwiseParameters {
    fn default() -> Self {
        StepwiseParameters {
            regressor_kind: None,
            regressor_parameters: RegressorParameters::default(),
            max_iterations: None,
            aout: DEFAULT_AOUT,
        }
    }
}

impl StepwiseParameters {
    pub fn new(registry: &RegressorRegistry, kind: RegressorKind) -> Result<Self> {
        let mut params = Self::default();
        params.set_regressor_kind(registry, kind)?;
        Ok(params)
    }

    pub fn regressor_kind(&self) -> Option<&RegressorKind> {
        self.regressor_kind.as_ref()
    }

    /// Store `kind` if the registry can build it as a p-value reporting
    /// regressor; otherwise leave the configuration unchanged.
    pub fn set_regressor_kind(
        &mut self,
        registry: &RegressorRegistry,
        kind: RegressorKind,
    ) -> Result<()> {
        if !registry.is_registered(&kind) {
            return Err(StepwiseError::Configuration(format!(
                "Regressor '{}' is not registered",
                kind
            ))
            .into());
        }
        if !registry.is_stepwise_compatible(&kind) {
            return Err(StepwiseError::Configuration(format!(
                "Regressor '{}' is not stepwise compatible as it does not calculate feature p-values",
                kind
            ))
            .into());
        }
        self.regressor_kind = Some(kind);
        Ok(())
    }

    pub fn regressor_parameters(&self) -> &RegressorParameters {
        &self.regressor_parameters
    }

    pub fn set_regressor_parameters(&mut self, params: RegressorParameters) {
        self.regressor_parameters = params;
    }

    pub fn max_iterations(&self) -> Option<usize> {
        self.max_iterations
    }

    /// `None` means the elimination loop runs until convergence.
    pub fn set_max_iterations(&mut self, max_iterations: Option<usize>) -> Result<()> {
        if max_iterations == Some(0) {
            return Err(StepwiseError::Configuration(
                "max_iterations must be at least 1".to_string(),
            )
            .into());
        }
        self.max_iterations = max_iterations;
        Ok(())
    }

    pub fn aout(&self) -> f64 {
        self.aout
    }

    pub fn set_aout(&mut self, aout: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&aout) {
            return Err(StepwiseError::Configuration(format!(
                "aout must lie in [0, 1], got {}",
                aout
            ))
            .into());
        }
        self.aout = aout;
        Ok(())
    }

    /// Re-run every setter's validation, e.g. after deserializing.
    pub fn validate(&self, registry: &RegressorRegistry) -> Result<()> {
        let mut checked = Self::default();
        if let Some(kind) = &self.regressor_kind {
            checked.set_regressor_kind(registry, kind.clone())?;
        }
        checked.set_max_iterations(self.max_iterations)?;
        checked.set_aout(self.aout)?;
        Ok(())
    }

    /// Load parameters from a JSON file.
    ///
    /// Missing or malformed fields fall back to their defaults with a warning;
    /// the values that are present go through the validated setters.
    pub fn from_json_file<P: AsRef<Path>>(path: P, registry: &RegressorRegistry) -> Result<Self> {
        let config_json = fs::read_to_string(path.as_ref()).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            )
        })?;
        Self::from_json_str(&config_json, registry)
    }

    pub fn from_json_str(config_json: &str, registry: &RegressorRegistry) -> Result<Self> {
        let partial: serde_json::Value = serde_json::from_str(config_json)?;
        let mut config = StepwiseParameters::default();

        macro_rules! load_or_default {
            ($field:ident, $ty:ty, $apply:expr) => {
                match partial.get(stringify!($field)) {
                    Some(val) => match serde_json::from_value::<$ty>(val.clone()) {
                        Ok(parsed) => $apply(&mut config, parsed)?,
                        Err(_) => log::warn!(
                            "Config Invalid value for '{}', using default: {:?}",
                            stringify!($field),
                            config.$field
                        ),
                    },
                    None => log::warn!(
                        "Config Missing field '{}', using default: {:?}",
                        stringify!($field),
                        config.$field
                    ),
                }
            };
        }

        load_or_default!(
            regressor_kind,
            RegressorKind,
            |c: &mut Self, kind| c.set_regressor_kind(registry, kind)
        );
        load_or_default!(
            regressor_parameters,
            RegressorParameters,
            |c: &mut Self, p| -> Result<()> {
                c.set_regressor_parameters(p);
                Ok(())
            }
        );
        load_or_default!(
            max_iterations,
            Option<usize>,
            |c: &mut Self, m| c.set_max_iterations(m)
        );
        load_or_default!(aout, f64, |c: &mut Self, a| c.set_aout(a));

        Ok(config)
    }
}
