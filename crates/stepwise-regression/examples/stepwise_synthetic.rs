use std::sync::Arc;

use anyhow::Result;
use log::LevelFilter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use stepwise_regression::logging::init_logging;
use stepwise_regression::{
    Dataset, ModelContext, RegressorKind, RegressorRegistry, StepwiseParameters,
    StepwiseRegression, StorageConfig,
};

fn main() -> Result<()> {
    init_logging(LevelFilter::Debug);

    // 200 samples: y depends on x1 and x2 only, x3..x5 are noise
    let mut rng = StdRng::seed_from_u64(42);
    let n = 200;
    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(n); 5];
    let mut y = Vec::with_capacity(n);
    for _ in 0..n {
        let row: Vec<f64> = (0..5).map(|_| rng.gen_range(-1.0..1.0)).collect();
        y.push(0.5 + 4.0 * row[0] - 2.0 * row[1] + rng.gen_range(-0.3..0.3));
        for (column, value) in columns.iter_mut().zip(row) {
            column.push(value);
        }
    }

    let mut data = Dataset::new(y);
    for (i, values) in columns.into_iter().enumerate() {
        data.add_column(&format!("x{}", i + 1), values)?;
    }
    data.add_constant_column();
    data.log_summary();

    let registry = Arc::new(RegressorRegistry::with_builtins());
    let mut params = StepwiseParameters::new(&registry, RegressorKind::MatrixLinearRegression)?;
    params.set_aout(0.01)?;

    let context = ModelContext::from_config("stepwise-synthetic", &StorageConfig::InMemory)?;
    let mut model = StepwiseRegression::new(context, registry);
    model.fit(&data, params)?;

    if let Some(summary) = model.summary() {
        println!("Selected features: {:?}", summary.selected_features);
        for removed in &summary.eliminated {
            println!(
                "  iteration {}: removed {} (p = {:.4})",
                removed.iteration, removed.feature, removed.pvalue
            );
        }
    }

    let metrics = model.validate(&data)?;
    println!(
        "R^2 = {:.4}, adjusted R^2 = {:.4}, RMSE = {:.4}",
        metrics.r_squared, metrics.adjusted_r_squared, metrics.rmse
    );

    model.predict(&mut data)?;
    if let Some(predictions) = data.predictions() {
        println!(
            "First predictions: {:?}",
            predictions.iter().take(5).collect::<Vec<_>>()
        );
    }

    model.erase()?;
    Ok(())
}
