//! stepwise-regression: backward-elimination feature selection for regression.
//!
//! The crate wraps any regressor that reports per-feature p-values and
//! repeatedly drops the least significant feature until every remaining one
//! is significant. It provides the orchestrator ([`stepwise`]), the delegate
//! contract and a registry of built-in regressors ([`models`]), a value-type
//! column dataset ([`dataset`]), configuration ([`config`]) and the storage
//! context that fitted models persist into ([`storage`]).
pub mod config;
pub mod dataset;
pub mod error;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod stepwise;
pub mod storage;

pub use config::{RegressorKind, RegressorParameters, StepwiseParameters};
pub use dataset::Dataset;
pub use error::StepwiseError;
pub use models::factory::RegressorRegistry;
pub use models::regressor_trait::{PvalueReport, Regressor, StepwiseCompatible};
pub use models::utils::RegressionMetrics;
pub use stepwise::{ModelSummary, StepwiseRegression};
pub use storage::{ModelContext, StorageConfig};
