//! Backward-elimination stepwise regression.
//!
//! `StepwiseRegression` wraps a p-value reporting regressor. Fitting starts
//! from every column of the training data, repeatedly fits a fresh delegate,
//! drops the least significant feature and stops once every remaining feature
//! is significant at `aout`. A final delegate is then trained on the surviving
//! columns and kept for prediction and validation.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{RegressorKind, StepwiseParameters};
use crate::dataset::Dataset;
use crate::error::StepwiseError;
use crate::models::factory::RegressorRegistry;
use crate::models::regressor_trait::{PvalueReport, StepwiseCompatible};
use crate::models::utils::RegressionMetrics;
use crate::storage::ModelContext;

const KNOWLEDGE_KEY: &str = "stepwise_regression.knowledge";

/// A feature dropped during elimination.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct EliminatedFeature {
    /// Zero-based elimination iteration.
    pub iteration: usize,
    pub feature: String,
    pub pvalue: f64,
}

/// Shape of the data the retained regressor was trained on.
///
/// The coefficients themselves belong to the delegate regressor.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModelSummary {
    /// Surviving column count, including the constant column.
    pub d: usize,
    /// Number of training rows.
    pub n: usize,
    pub selected_features: Vec<String>,
    pub eliminated: Vec<EliminatedFeature>,
    /// Delegate fits performed by the elimination loop.
    pub iterations: usize,
    pub fitted_at: DateTime<Utc>,
}

/// What the orchestrator persists for itself.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct StepwiseKnowledge {
    pub parameters: StepwiseParameters,
    pub summary: ModelSummary,
}

/// Result of the elimination loop, before the final fit.
struct Elimination {
    data: Dataset,
    eliminated: Vec<EliminatedFeature>,
    iterations: usize,
}

pub struct StepwiseRegression {
    context: ModelContext,
    registry: Arc<RegressorRegistry>,
    knowledge: Option<StepwiseKnowledge>,
    /// The retained delegate. `None` until fitted or lazily reloaded.
    regressor: Option<Box<dyn StepwiseCompatible>>,
    interrupt: Option<Arc<AtomicBool>>,
}

impl StepwiseRegression {
    pub fn new(context: ModelContext, registry: Arc<RegressorRegistry>) -> Self {
        StepwiseRegression {
            context,
            registry,
            knowledge: None,
            regressor: None,
            interrupt: None,
        }
    }

    /// Stop fitting between iterations once `flag` is raised.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn context(&self) -> &ModelContext {
        &self.context
    }

    /// Summary of the last fit, if it is loaded.
    pub fn summary(&self) -> Option<&ModelSummary> {
        self.knowledge.as_ref().map(|k| &k.summary)
    }

    pub fn parameters(&self) -> Option<&StepwiseParameters> {
        self.knowledge.as_ref().map(|k| &k.parameters)
    }

    /// Whether a delegate instance is currently held in memory.
    pub fn has_loaded_regressor(&self) -> bool {
        self.regressor.is_some()
    }

    /// Run backward elimination on a copy of `data`, then train and retain a
    /// delegate on the surviving columns. `data` is never modified.
    ///
    /// The previous fit is erased before the loop starts, so on error nothing
    /// is retained in memory or in storage.
    pub fn fit(&mut self, data: &Dataset, parameters: StepwiseParameters) -> Result<()> {
        parameters.validate(&self.registry)?;
        let kind = parameters.regressor_kind().cloned().ok_or_else(|| {
            StepwiseError::Configuration("No regressor kind configured".to_string())
        })?;

        self.release_previous_fit()?;

        log::info!(
            "Stepwise regression with '{}' on {} rows x {} columns (aout = {}, max_iterations = {:?})",
            kind,
            data.row_count(),
            data.column_count(),
            parameters.aout(),
            parameters.max_iterations()
        );

        let Elimination {
            data: reduced,
            eliminated,
            iterations,
        } = self.eliminate(data.clone(), &kind, &parameters)?;

        let summary = ModelSummary {
            d: reduced.column_count(),
            n: reduced.row_count(),
            selected_features: reduced.feature_names(),
            eliminated,
            iterations,
            fitted_at: Utc::now(),
        };

        let mut regressor = self.registry.build_stepwise(&kind, self.context.clone())?;
        log::trace!("Fitting retained '{}' regressor", regressor.name());
        if let Err(err) = regressor.fit(&reduced, parameters.regressor_parameters()) {
            if let Err(cleanup) = regressor.erase() {
                log::warn!("Failed to erase regressor after a failed fit: {}", cleanup);
            }
            return Err(err);
        }
        drop(reduced);

        let knowledge = StepwiseKnowledge {
            parameters,
            summary,
        };
        self.context.save(KNOWLEDGE_KEY, &knowledge)?;

        log::info!(
            "Stepwise regression kept {} of {} columns after {} iterations: {:?}",
            knowledge.summary.d,
            data.column_count(),
            knowledge.summary.iterations,
            knowledge.summary.selected_features
        );

        self.knowledge = Some(knowledge);
        self.regressor = Some(regressor);
        Ok(())
    }

    /// Erase the retained delegate and persisted summary of an earlier fit.
    ///
    /// The delegate erase is best effort: a stored kind that can no longer be
    /// built must not block a new fit. The summary is always removed.
    fn release_previous_fit(&mut self) -> Result<()> {
        let stored = self.regressor.is_some()
            || self.knowledge.is_some()
            || self.context.keys()?.iter().any(|key| key == KNOWLEDGE_KEY);
        if stored {
            let erased = self.ensure_regressor().and_then(|regressor| regressor.erase());
            if let Err(err) = erased {
                log::warn!(
                    "Could not erase the previous regressor of '{}': {}",
                    self.context.db_name(),
                    err
                );
            }
        }
        // At most one delegate is alive per orchestrator.
        self.regressor = None;
        self.knowledge = None;
        self.context.remove(KNOWLEDGE_KEY)
    }

    /// The elimination loop. Owns and mutates `working`, the private copy.
    fn eliminate(
        &self,
        mut working: Dataset,
        kind: &RegressorKind,
        parameters: &StepwiseParameters,
    ) -> Result<Elimination> {
        let max_iterations = parameters.max_iterations().unwrap_or(usize::MAX);
        let aout = parameters.aout();
        let mut eliminated = Vec::new();
        let mut iterations = 0;

        for iteration in 0..max_iterations {
            if self.interrupted() {
                log::warn!("Stepwise regression interrupted before iteration {}", iteration);
                return Err(StepwiseError::Interrupted { iteration }.into());
            }

            let report = self.run_regression(&working, kind, parameters)?;
            iterations += 1;

            if report.is_empty() {
                log::debug!("Iteration {}: empty p-value report, stopping", iteration);
                break;
            }

            let Some((feature, pvalue)) = report.least_significant(Dataset::CONSTANT_COLUMN)
            else {
                log::debug!("Iteration {}: only the constant column is left", iteration);
                break;
            };

            if pvalue <= aout {
                log::debug!(
                    "Iteration {}: highest p-value {:.6} ('{}') <= aout {}, all features significant",
                    iteration,
                    pvalue,
                    feature,
                    aout
                );
                break;
            }

            log::debug!(
                "Iteration {}: removing '{}' (p-value {:.6} > {})",
                iteration,
                feature,
                pvalue,
                aout
            );
            working.remove_column(feature);
            eliminated.push(EliminatedFeature {
                iteration,
                feature: feature.to_string(),
                pvalue,
            });

            if working.column_count() == 0 {
                log::debug!("Iteration {}: no columns left", iteration);
                break;
            }
        }

        Ok(Elimination {
            data: working,
            eliminated,
            iterations,
        })
    }

    /// Fit a throw-away delegate and return its p-values. The delegate's
    /// persisted state is erased and the instance dropped before returning.
    fn run_regression(
        &self,
        data: &Dataset,
        kind: &RegressorKind,
        parameters: &StepwiseParameters,
    ) -> Result<PvalueReport> {
        let mut regressor = self.registry.build_stepwise(kind, self.context.clone())?;
        log::trace!(
            "Fitting '{}' on {} columns",
            regressor.name(),
            data.column_count()
        );

        let fitted = regressor
            .fit(data, parameters.regressor_parameters())
            .and_then(|_| regressor.feature_pvalues());

        match fitted {
            Ok(report) => {
                regressor.erase()?;
                Ok(report)
            }
            Err(err) => {
                if let Err(cleanup) = regressor.erase() {
                    log::warn!("Failed to erase regressor after a failed fit: {}", cleanup);
                }
                Err(err)
            }
        }
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    /// Not offered: run cross-validation on the wrapped regressor instead.
    pub fn k_fold_cross_validation(
        &mut self,
        _data: &Dataset,
        _parameters: &StepwiseParameters,
        _k: usize,
    ) -> Result<RegressionMetrics> {
        Err(StepwiseError::UnsupportedOperation(
            "K-fold cross validation is not supported. Run it directly on the wrapped regressor"
                .to_string(),
        )
        .into())
    }

    /// Validate the retained regressor; its metrics are returned unchanged.
    pub fn validate(&mut self, data: &Dataset) -> Result<RegressionMetrics> {
        self.ensure_regressor()?.validate(data)
    }

    /// Write predictions of the retained regressor into `data`.
    pub fn predict(&mut self, data: &mut Dataset) -> Result<()> {
        self.ensure_regressor()?.predict(data)
    }

    /// Erase the retained regressor's state, then this model's own state.
    pub fn erase(&mut self) -> Result<()> {
        self.ensure_regressor()?.erase()?;
        self.regressor = None;
        self.knowledge = None;
        self.context.remove(KNOWLEDGE_KEY)?;
        log::info!("Erased stepwise regression '{}'", self.context.db_name());
        Ok(())
    }

    /// Load the persisted summary and rebuild the delegate if it is not in
    /// memory. Fails with `NotFitted` when nothing was ever stored.
    pub fn ensure_regressor(&mut self) -> Result<&mut Box<dyn StepwiseCompatible>> {
        if self.regressor.is_none() {
            if self.knowledge.is_none() {
                let knowledge = self
                    .context
                    .load::<StepwiseKnowledge>(KNOWLEDGE_KEY)?
                    .ok_or(StepwiseError::NotFitted)?;
                self.knowledge = Some(knowledge);
            }
            let kind = self
                .parameters()
                .and_then(|p| p.regressor_kind())
                .cloned()
                .ok_or_else(|| {
                    StepwiseError::Configuration(
                        "Stored parameters have no regressor kind".to_string(),
                    )
                })?;
            log::trace!(
                "Reloading '{}' regressor from storage '{}'",
                kind,
                self.context.db_name()
            );
            self.regressor = Some(self.registry.build_stepwise(&kind, self.context.clone())?);
        }
        self.regressor
            .as_mut()
            .ok_or_else(|| StepwiseError::NotFitted.into())
    }
}
