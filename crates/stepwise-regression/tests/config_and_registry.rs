//! Integration tests for training configuration and the regressor registry.

mod common;

use std::io::Write;
use std::sync::Arc;

use stepwise_regression::models::linear::MatrixLinearRegression;
use stepwise_regression::{
    RegressorKind, RegressorParameters, RegressorRegistry, StepwiseError, StepwiseParameters,
};

fn configuration_error(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<StepwiseError>(),
        Some(StepwiseError::Configuration(_))
    )
}

// ---------------------------------------------------------------------------
// Capability check on the regressor kind
// ---------------------------------------------------------------------------

#[test]
fn regressor_without_pvalues_is_rejected_immediately() {
    let registry = RegressorRegistry::with_builtins();
    let mut params = StepwiseParameters::default();

    let err = params
        .set_regressor_kind(&registry, RegressorKind::Nlms)
        .unwrap_err();

    assert!(configuration_error(&err));
    assert!(params.regressor_kind().is_none(), "kind must not be stored");
}

#[test]
fn unregistered_kind_is_rejected() {
    let registry = RegressorRegistry::with_builtins();
    let err = StepwiseParameters::new(&registry, RegressorKind::Custom("ridge".to_string()))
        .unwrap_err();
    assert!(configuration_error(&err));
}

#[test]
fn rejection_keeps_the_previous_kind() {
    let registry = RegressorRegistry::with_builtins();
    let mut params =
        StepwiseParameters::new(&registry, RegressorKind::MatrixLinearRegression).unwrap();
    assert!(params.set_regressor_kind(&registry, RegressorKind::Nlms).is_err());
    assert_eq!(
        params.regressor_kind(),
        Some(&RegressorKind::MatrixLinearRegression)
    );
}

#[test]
fn custom_stepwise_regressor_can_be_registered() {
    let mut registry = RegressorRegistry::new();
    let kind = RegressorKind::Custom("ols_copy".to_string());
    registry.register_stepwise(kind.clone(), |ctx| Box::new(MatrixLinearRegression::new(ctx)));

    let params = StepwiseParameters::new(&registry, kind.clone()).unwrap();
    assert_eq!(params.regressor_kind(), Some(&kind));
}

#[test]
fn plain_registration_overrides_stepwise_capability() {
    let mut registry = RegressorRegistry::with_builtins();
    registry.register_regressor(RegressorKind::MatrixLinearRegression, |ctx| {
        Box::new(MatrixLinearRegression::new(ctx))
    });
    assert!(!registry.is_stepwise_compatible(&RegressorKind::MatrixLinearRegression));
}

// ---------------------------------------------------------------------------
// JSON configuration files
// ---------------------------------------------------------------------------

#[test]
fn loads_parameters_from_json_file() {
    common::init_logger();
    let registry = RegressorRegistry::with_builtins();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "regressor_kind": "matrix_linear_regression",
            "regressor_parameters": {{}},
            "max_iterations": 4,
            "aout": 0.1
        }}"#
    )
    .unwrap();

    let params = StepwiseParameters::from_json_file(file.path(), &registry).unwrap();

    assert_eq!(
        params.regressor_kind(),
        Some(&RegressorKind::MatrixLinearRegression)
    );
    assert_eq!(params.max_iterations(), Some(4));
    assert_eq!(params.aout(), 0.1);
    assert_eq!(
        params.regressor_parameters(),
        &RegressorParameters::new(serde_json::json!({}))
    );
}

#[test]
fn missing_fields_fall_back_to_defaults() {
    let registry = RegressorRegistry::with_builtins();
    let params =
        StepwiseParameters::from_json_str(r#"{"regressor_kind": "matrix_linear_regression"}"#, &registry)
            .unwrap();
    assert_eq!(params.aout(), 0.05);
    assert_eq!(params.max_iterations(), None);
}

#[test]
fn json_with_incapable_regressor_fails() {
    let registry = RegressorRegistry::with_builtins();
    let err = StepwiseParameters::from_json_str(r#"{"regressor_kind": "nlms"}"#, &registry)
        .unwrap_err();
    assert!(configuration_error(&err));
}

#[test]
fn json_with_out_of_range_aout_fails() {
    let registry = RegressorRegistry::with_builtins();
    let err = StepwiseParameters::from_json_str(r#"{"aout": 1.5}"#, &registry).unwrap_err();
    assert!(configuration_error(&err));
}

#[test]
fn missing_config_file_errors() {
    let registry = RegressorRegistry::with_builtins();
    assert!(StepwiseParameters::from_json_file("/nonexistent/stepwise.json", &registry).is_err());
}

#[test]
fn parameters_serialize_roundtrip_and_revalidate() {
    let registry = Arc::new(RegressorRegistry::with_builtins());
    let mut params =
        StepwiseParameters::new(&registry, RegressorKind::MatrixLinearRegression).unwrap();
    params.set_max_iterations(Some(3)).unwrap();

    let json = serde_json::to_string(&params).unwrap();
    let back: StepwiseParameters = serde_json::from_str(&json).unwrap();

    assert_eq!(back, params);
    assert!(back.validate(&registry).is_ok());
}
