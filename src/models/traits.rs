//! Forecaster trait defining the model adapter contract.

use std::sync::Arc;

use crate::core::{ForecastBands, Series};
use crate::error::{PipelineError, Result};

/// Capability interface for any point-forecasting model.
///
/// The contract the backtest controller relies on:
///
/// - `fit` fails with [`PipelineError::ModelFit`] on degenerate history
///   (too short, non-finite values, or whatever the model cannot handle);
///   it never panics.
/// - `predict` fails with [`PipelineError::ModelPredict`] for a zero
///   horizon, and otherwise returns exactly `horizon` points, each with a
///   lower and upper uncertainty bound.
///
/// Both failures are recoverable per-task conditions for the caller.
pub trait Forecaster: Send {
    /// Fit the model to the series history.
    fn fit(&mut self, series: &Series) -> Result<()>;

    /// Predict the next `horizon` steps with uncertainty bounds.
    fn predict(&self, horizon: usize) -> Result<ForecastBands>;

    /// Model name, used in forecasts and failure reasons.
    fn name(&self) -> &str;
}

/// Type alias for boxed forecaster trait objects.
pub type BoxedForecaster = Box<dyn Forecaster>;

/// Factory producing a fresh model instance per (series, split) task.
///
/// Shared across the worker pool, so it must be `Send + Sync`; each created
/// model is used by a single worker.
pub type ModelFactory = Arc<dyn Fn() -> BoxedForecaster + Send + Sync>;

/// History validation shared by the reference models.
///
/// Maps degenerate inputs to `ModelFit` per the adapter contract.
pub(crate) fn check_history(series: &Series, min_len: usize) -> Result<&[f64]> {
    let values = series.values();
    if values.len() < min_len {
        return Err(PipelineError::ModelFit(format!(
            "history too short: need at least {min_len} observations, got {}",
            values.len()
        )));
    }
    if !series.is_finite() {
        return Err(PipelineError::ModelFit(
            "history contains non-finite values".to_string(),
        ));
    }
    Ok(values)
}

/// Horizon validation shared by the reference models.
pub(crate) fn check_horizon(horizon: usize) -> Result<()> {
    if horizon == 0 {
        return Err(PipelineError::ModelPredict(
            "horizon must be positive".to_string(),
        ));
    }
    Ok(())
}
