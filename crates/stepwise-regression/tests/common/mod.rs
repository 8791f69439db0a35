//! Scripted p-value regressor shared by the integration tests.
//!
//! The regressor answers `feature_pvalues` from a table keyed by the exact
//! column set it was fitted on, and reports every construction, drop and
//! erase to a shared `Tracker`.
#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use ndarray::Array1;

use stepwise_regression::models::utils::RegressionMetrics;
use stepwise_regression::{
    Dataset, ModelContext, PvalueReport, Regressor, RegressorKind, RegressorParameters,
    RegressorRegistry, StepwiseCompatible, StepwiseError,
};

pub const SCRIPTED_KEY: &str = "scripted.model";

pub fn scripted_kind() -> RegressorKind {
    RegressorKind::Custom("scripted".to_string())
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Error type raised by a scripted fit, used to check it is not rewrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedFailure(pub String);

impl fmt::Display for ScriptedFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "scripted failure: {}", self.0)
    }
}

impl std::error::Error for ScriptedFailure {}

/// Canned answers keyed by the sorted column names of the fitted dataset.
#[derive(Default)]
pub struct Script {
    reports: HashMap<Vec<String>, Vec<(String, f64)>>,
    failures: HashMap<Vec<String>, String>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, columns: &[&str], report: &[(&str, f64)]) -> Self {
        self.reports.insert(
            sorted(columns),
            report.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        );
        self
    }

    pub fn fail_on(mut self, columns: &[&str], message: &str) -> Self {
        self.failures.insert(sorted(columns), message.to_string());
        self
    }

    fn answer(&self, columns: &[String]) -> Result<PvalueReport> {
        if let Some(message) = self.failures.get(columns) {
            return Err(anyhow!(ScriptedFailure(message.clone())));
        }
        let entries = self
            .reports
            .get(columns)
            .ok_or_else(|| anyhow!("no scripted report for columns {:?}", columns))?;
        Ok(entries.iter().cloned().collect())
    }
}

fn sorted(columns: &[&str]) -> Vec<String> {
    let mut names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    names.sort();
    names
}

#[derive(Default)]
pub struct Tracker {
    pub live: AtomicUsize,
    pub max_live: AtomicUsize,
    pub created: AtomicUsize,
    pub erased: AtomicUsize,
    pub fitted_on: Mutex<Vec<Vec<String>>>,
    pub contexts: Mutex<Vec<ModelContext>>,
}

impl Tracker {
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn erased(&self) -> usize {
        self.erased.load(Ordering::SeqCst)
    }

    pub fn fitted_on(&self) -> Vec<Vec<String>> {
        self.fitted_on.lock().unwrap().clone()
    }
}

pub struct ScriptedRegressor {
    context: ModelContext,
    tracker: Arc<Tracker>,
    script: Arc<Script>,
    columns: Option<Vec<String>>,
}

impl ScriptedRegressor {
    pub fn new(context: ModelContext, tracker: Arc<Tracker>, script: Arc<Script>) -> Self {
        let live = tracker.live.fetch_add(1, Ordering::SeqCst) + 1;
        tracker.max_live.fetch_max(live, Ordering::SeqCst);
        tracker.created.fetch_add(1, Ordering::SeqCst);
        tracker.contexts.lock().unwrap().push(context.clone());
        ScriptedRegressor {
            context,
            tracker,
            script,
            columns: None,
        }
    }

    fn ensure_columns(&mut self) -> Result<Vec<String>> {
        if self.columns.is_none() {
            let stored: Vec<String> = self
                .context
                .load(SCRIPTED_KEY)?
                .ok_or(StepwiseError::NotFitted)?;
            self.columns = Some(stored);
        }
        Ok(self.columns.clone().unwrap_or_default())
    }
}

impl Drop for ScriptedRegressor {
    fn drop(&mut self) {
        self.tracker.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Regressor for ScriptedRegressor {
    fn fit(&mut self, data: &Dataset, _params: &RegressorParameters) -> Result<()> {
        let columns = data.feature_names();
        self.tracker.fitted_on.lock().unwrap().push(columns.clone());
        if let Some(message) = self.script.failures.get(&columns) {
            return Err(anyhow!(ScriptedFailure(message.clone())));
        }
        self.context.save(SCRIPTED_KEY, &columns)?;
        self.columns = Some(columns);
        Ok(())
    }

    /// Prediction is the row sum of the fitted columns.
    fn predict(&mut self, data: &mut Dataset) -> Result<()> {
        let columns = self.ensure_columns()?;
        let mut out = Array1::<f64>::zeros(data.row_count());
        for name in &columns {
            let column = data
                .column(name)
                .ok_or_else(|| StepwiseError::UnknownColumn(name.clone()))?;
            out = out + column;
        }
        data.set_predictions(out)
    }

    fn validate(&mut self, data: &Dataset) -> Result<RegressionMetrics> {
        let mut scored = data.clone();
        self.predict(&mut scored)?;
        let columns = self.ensure_columns()?;
        Ok(RegressionMetrics::compute(
            data.target(),
            scored.predictions().unwrap(),
            columns.len(),
        ))
    }

    fn erase(&mut self) -> Result<()> {
        self.tracker.erased.fetch_add(1, Ordering::SeqCst);
        self.columns = None;
        self.context.remove(SCRIPTED_KEY)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

impl StepwiseCompatible for ScriptedRegressor {
    fn feature_pvalues(&self) -> Result<PvalueReport> {
        let columns = self.columns.as_ref().ok_or(StepwiseError::NotFitted)?;
        self.script.answer(columns)
    }
}

/// Built-in registry plus the scripted regressor.
pub fn scripted_registry(tracker: Arc<Tracker>, script: Script) -> RegressorRegistry {
    let script = Arc::new(script);
    let mut registry = RegressorRegistry::with_builtins();
    registry.register_stepwise(scripted_kind(), move |ctx| {
        Box::new(ScriptedRegressor::new(ctx, tracker.clone(), script.clone()))
    });
    registry
}

/// `{constant, A, B, C}` with 6 rows.
pub fn abc_dataset() -> Dataset {
    Dataset::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        .with_column("A", vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6])
        .unwrap()
        .with_column("B", vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0])
        .unwrap()
        .with_column("C", vec![5.0, 3.0, 1.0, 2.0, 4.0, 6.0])
        .unwrap()
        .with_constant()
}

/// The three-iteration elimination scenario on `abc_dataset`.
pub fn abc_script() -> Script {
    Script::new()
        .on(
            &["(constant)", "A", "B", "C"],
            &[("A", 0.8), ("B", 0.03), ("C", 0.6)],
        )
        .on(&["(constant)", "B", "C"], &[("B", 0.03), ("C", 0.2)])
        .on(&["(constant)", "B"], &[("B", 0.03)])
}
