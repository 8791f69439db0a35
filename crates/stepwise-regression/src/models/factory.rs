//! Registry mapping a `RegressorKind` to a constructor.
//!
//! Constructors registered through [`RegressorRegistry::register_stepwise`]
//! must return a `Box<dyn StepwiseCompatible>`, so p-value support is checked
//! by the type system when a regressor is registered. Only those kinds are
//! accepted as stepwise delegates.
use std::collections::HashMap;

use anyhow::Result;

use crate::config::{RegressorKind, RegressorParameters};
use crate::dataset::Dataset;
use crate::error::StepwiseError;
use crate::models::linear::MatrixLinearRegression;
use crate::models::nlms::NlmsRegression;
use crate::models::regressor_trait::{Regressor, StepwiseCompatible};
use crate::models::utils::RegressionMetrics;
use crate::storage::ModelContext;

pub type RegressorConstructor = Box<dyn Fn(ModelContext) -> Box<dyn Regressor> + Send + Sync>;
pub type StepwiseConstructor =
    Box<dyn Fn(ModelContext) -> Box<dyn StepwiseCompatible> + Send + Sync>;

enum Registration {
    Plain(RegressorConstructor),
    Stepwise(StepwiseConstructor),
}

/// Build regressors bound to a storage context from their kind.
#[derive(Default)]
pub struct RegressorRegistry {
    entries: HashMap<RegressorKind, Registration>,
}

impl RegressorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the regressors shipped in this crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_stepwise(RegressorKind::MatrixLinearRegression, |ctx| {
            Box::new(MatrixLinearRegression::new(ctx))
        });
        registry.register_regressor(RegressorKind::Nlms, |ctx| {
            Box::new(NlmsRegression::new(ctx))
        });
        registry
    }

    /// Register a regressor that does not report p-values. Replaces any
    /// previous registration of `kind`.
    pub fn register_regressor<F>(&mut self, kind: RegressorKind, constructor: F)
    where
        F: Fn(ModelContext) -> Box<dyn Regressor> + Send + Sync + 'static,
    {
        log::trace!("Registering regressor '{}'", kind);
        self.entries
            .insert(kind, Registration::Plain(Box::new(constructor)));
    }

    /// Register a p-value reporting regressor. Replaces any previous
    /// registration of `kind`.
    pub fn register_stepwise<F>(&mut self, kind: RegressorKind, constructor: F)
    where
        F: Fn(ModelContext) -> Box<dyn StepwiseCompatible> + Send + Sync + 'static,
    {
        log::trace!("Registering stepwise compatible regressor '{}'", kind);
        self.entries
            .insert(kind, Registration::Stepwise(Box::new(constructor)));
    }

    pub fn is_registered(&self, kind: &RegressorKind) -> bool {
        self.entries.contains_key(kind)
    }

    pub fn is_stepwise_compatible(&self, kind: &RegressorKind) -> bool {
        matches!(self.entries.get(kind), Some(Registration::Stepwise(_)))
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<RegressorKind> {
        let mut kinds: Vec<RegressorKind> = self.entries.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Build any registered regressor for plain fit/predict/validate use.
    pub fn build(&self, kind: &RegressorKind, context: ModelContext) -> Result<Box<dyn Regressor>> {
        match self.entries.get(kind) {
            Some(Registration::Plain(constructor)) => Ok(constructor(context)),
            Some(Registration::Stepwise(constructor)) => Ok(Box::new(StepwiseAsRegressor(
                constructor(context),
            ))),
            None => Err(unregistered(kind)),
        }
    }

    /// Build a regressor usable as a stepwise delegate.
    pub fn build_stepwise(
        &self,
        kind: &RegressorKind,
        context: ModelContext,
    ) -> Result<Box<dyn StepwiseCompatible>> {
        match self.entries.get(kind) {
            Some(Registration::Stepwise(constructor)) => Ok(constructor(context)),
            Some(Registration::Plain(_)) => Err(StepwiseError::Configuration(format!(
                "Regressor '{}' is not stepwise compatible as it does not calculate feature p-values",
                kind
            ))
            .into()),
            None => Err(unregistered(kind)),
        }
    }
}

fn unregistered(kind: &RegressorKind) -> anyhow::Error {
    StepwiseError::Configuration(format!("Regressor '{}' is not registered", kind)).into()
}

/// Exposes a stepwise regressor through the plain `Regressor` interface.
struct StepwiseAsRegressor(Box<dyn StepwiseCompatible>);

impl Regressor for StepwiseAsRegressor {
    fn fit(&mut self, data: &Dataset, params: &RegressorParameters) -> Result<()> {
        self.0.fit(data, params)
    }

    fn predict(&mut self, data: &mut Dataset) -> Result<()> {
        self.0.predict(data)
    }

    fn validate(&mut self, data: &Dataset) -> Result<RegressionMetrics> {
        self.0.validate(data)
    }

    fn erase(&mut self) -> Result<()> {
        self.0.erase()
    }

    fn name(&self) -> &str {
        self.0.name()
    }
}
