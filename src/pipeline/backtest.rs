//! Backtest controller: drive a model across every split of a series.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{Forecast, Series, SeriesKey};
use crate::error::{PipelineError, Result};
use crate::metrics::{compute_split_metrics, SplitMetrics};
use crate::models::ModelFactory;
use crate::pipeline::split::Split;

/// Outcome of evaluating one (series, split) pair. Never mutated after
/// creation: exactly one of `metrics` and `failure` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub key: SeriesKey,
    /// Position of the split in the series' split sequence.
    pub split_id: usize,
    /// Timestamp of the first test observation.
    pub origin: DateTime<Utc>,
    /// Metrics over the compared points, when evaluation succeeded.
    pub metrics: Option<SplitMetrics>,
    /// Failure reason, when fit, predict, or comparison failed.
    pub failure: Option<String>,
}

impl BacktestResult {
    pub fn succeeded(&self) -> bool {
        self.metrics.is_some()
    }
}

/// Fail with `TimedOut` once the series' wall-clock budget is spent.
pub(crate) fn check_deadline(deadline: Option<Instant>) -> Result<()> {
    match deadline {
        Some(d) if Instant::now() >= d => Err(PipelineError::TimedOut),
        _ => Ok(()),
    }
}

/// Evaluate every split of a series, in split order.
///
/// Each split gets a fresh model from the factory; a fit or predict failure
/// is captured in that split's `BacktestResult` and never aborts the
/// remaining splits. No retries. The deadline is checked between splits and
/// aborts the whole series with `TimedOut` when exceeded.
pub fn backtest_series(
    series: &Series,
    splits: &[Split],
    factory: &ModelFactory,
    deadline: Option<Instant>,
) -> Result<Vec<BacktestResult>> {
    let mut results = Vec::with_capacity(splits.len());

    for split in splits {
        check_deadline(deadline)?;

        let origin = series.timestamps()[split.origin];
        let result = match evaluate_split(series, split, factory) {
            Ok(metrics) => BacktestResult {
                key: series.key(),
                split_id: split.index,
                origin,
                metrics: Some(metrics),
                failure: None,
            },
            Err(err) => {
                warn!(
                    series = %series.key(),
                    split = split.index,
                    error = %err,
                    "split evaluation failed"
                );
                BacktestResult {
                    key: series.key(),
                    split_id: split.index,
                    origin,
                    metrics: None,
                    failure: Some(err.to_string()),
                }
            }
        };
        results.push(result);
    }

    Ok(results)
}

fn evaluate_split(series: &Series, split: &Split, factory: &ModelFactory) -> Result<SplitMetrics> {
    let train = series.slice(split.train.start, split.train.end)?;

    let mut model = factory();
    model.fit(&train)?;
    let bands = model.predict(split.test.len())?;

    let actual = &series.values()[split.test.clone()];
    compute_split_metrics(actual, bands.point())
}

/// Fit on the full history and project `horizon` future steps.
///
/// Produces the series' latest stored forecast; fit and predict errors
/// propagate so the caller can record the series as partial.
pub fn final_forecast(
    series: &Series,
    factory: &ModelFactory,
    horizon: usize,
    deadline: Option<Instant>,
) -> Result<Forecast> {
    check_deadline(deadline)?;

    let mut model = factory();
    model.fit(series)?;
    let bands = model.predict(horizon)?;

    debug!(series = %series.key(), horizon, model = model.name(), "forecast generated");

    let timestamps = series.future_timestamps(horizon)?;
    Forecast::from_bands(series.key(), model.name(), timestamps, &bands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoxedForecaster, Drift, Forecaster, Naive};
    use crate::pipeline::split::{generate_splits, BacktestConfig};
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn make_series(values: Vec<f64>) -> Series {
        let base = Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..values.len())
            .map(|i| base + Duration::days(i as i64))
            .collect();
        Series::new(SeriesKey::new(1, 1), timestamps, values).unwrap()
    }

    fn naive_factory() -> ModelFactory {
        Arc::new(|| Box::new(Naive::new()))
    }

    /// Model that always rejects fitting; used to exercise failure capture.
    struct Refusing;

    impl Forecaster for Refusing {
        fn fit(&mut self, _series: &Series) -> Result<()> {
            Err(PipelineError::ModelFit("refused".to_string()))
        }

        fn predict(&self, _horizon: usize) -> Result<crate::core::ForecastBands> {
            Err(PipelineError::ModelPredict("never fitted".to_string()))
        }

        fn name(&self) -> &str {
            "Refusing"
        }
    }

    #[test]
    fn results_follow_split_order() {
        let series = make_series((0..30).map(|i| i as f64).collect());
        let config = BacktestConfig::new(10, 5);
        let splits = generate_splits(series.len(), &config);

        let results = backtest_series(&series, &splits, &naive_factory(), None).unwrap();

        assert_eq!(results.len(), splits.len());
        for (result, split) in results.iter().zip(&splits) {
            assert_eq!(result.split_id, split.index);
            assert_eq!(result.origin, series.timestamps()[split.origin]);
            assert!(result.succeeded());
        }
        for pair in results.windows(2) {
            assert!(pair[1].origin > pair[0].origin);
        }
    }

    #[test]
    fn constant_series_backtests_with_zero_error() {
        let series = make_series(vec![5.0; 20]);
        let splits = generate_splits(series.len(), &BacktestConfig::new(10, 2));

        let results = backtest_series(&series, &splits, &naive_factory(), None).unwrap();
        for result in &results {
            let metrics = result.metrics.as_ref().unwrap();
            assert_eq!(metrics.mae, 0.0);
            assert_eq!(metrics.rmse, 0.0);
        }
    }

    #[test]
    fn fit_failure_is_captured_per_split() {
        let series = make_series((0..20).map(|i| i as f64).collect());
        let splits = generate_splits(series.len(), &BacktestConfig::new(10, 2));
        let factory: ModelFactory = Arc::new(|| Box::new(Refusing) as BoxedForecaster);

        let results = backtest_series(&series, &splits, &factory, None).unwrap();

        assert_eq!(results.len(), splits.len());
        for result in &results {
            assert!(!result.succeeded());
            assert!(result.metrics.is_none());
            assert!(result.failure.as_deref().unwrap().contains("refused"));
        }
    }

    #[test]
    fn expired_deadline_times_the_series_out() {
        let series = make_series((0..30).map(|i| i as f64).collect());
        let splits = generate_splits(series.len(), &BacktestConfig::new(10, 2));
        let expired = Some(Instant::now() - std::time::Duration::from_secs(1));

        let result = backtest_series(&series, &splits, &naive_factory(), expired);
        assert!(matches!(result, Err(PipelineError::TimedOut)));
    }

    #[test]
    fn final_forecast_extends_the_calendar() {
        let values: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        let series = make_series(values);
        let factory: ModelFactory = Arc::new(|| Box::new(Drift::new()));

        let forecast = final_forecast(&series, &factory, 5, None).unwrap();

        assert_eq!(forecast.horizon(), 5);
        assert_eq!(forecast.model(), "Drift");
        let last_history = *series.timestamps().last().unwrap();
        assert_eq!(forecast.points()[0].timestamp, last_history + Duration::days(1));
        for point in forecast.points() {
            assert!(point.lower <= point.value && point.value <= point.upper);
        }
    }

    #[test]
    fn final_forecast_propagates_model_failure() {
        let series = make_series(vec![1.0, 2.0, 3.0]);
        let factory: ModelFactory = Arc::new(|| Box::new(Refusing) as BoxedForecaster);

        assert!(matches!(
            final_forecast(&series, &factory, 5, None),
            Err(PipelineError::ModelFit(_))
        ));
    }

    #[test]
    fn backtest_result_round_trips_through_json() {
        let result = BacktestResult {
            key: SeriesKey::new(2, 3),
            split_id: 1,
            origin: Utc.with_ymd_and_hms(2018, 3, 1, 0, 0, 0).unwrap(),
            metrics: Some(SplitMetrics {
                mae: 1.25,
                rmse: 1.5,
                mape: None,
            }),
            failure: None,
        };

        let json = serde_json::to_string(&result).unwrap();
        let restored: BacktestResult = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, result);
    }
}
