//! Batch runner: the full per-series pipeline over a bounded worker pool.
//!
//! Series are embarrassingly parallel; each worker runs one series'
//! pipeline (splits, backtest, anomaly scoring, final forecast) to
//! completion and inserts the result into the store before taking the next
//! series. Failures below the batch level never abort sibling series.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::anomaly::{detect_anomalies, AnomalyConfig};
use crate::core::{Series, SeriesKey};
use crate::error::{PipelineError, Result};
use crate::metrics::{summarize_global, summarize_series, GlobalSummary, SeriesSummary, SplitMetrics};
use crate::models::ModelFactory;
use crate::pipeline::backtest::{backtest_series, check_deadline, final_forecast};
use crate::pipeline::partition::PartitionOutcome;
use crate::pipeline::split::{generate_splits, BacktestConfig};
use crate::store::{ResultStore, SeriesResult};

/// Batch-level execution settings.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Worker threads; zero means one per available core.
    pub workers: usize,
    /// Per-series wall-clock budget. A series over budget is reported
    /// `TimedOut` and excluded from the run's aggregates.
    pub series_timeout: Option<Duration>,
    /// Steps projected past the end of history for the stored forecast.
    pub forecast_horizon: usize,
}

impl BatchConfig {
    pub fn new() -> Self {
        Self {
            workers: 0,
            series_timeout: None,
            forecast_horizon: 90,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_series_timeout(mut self, timeout: Duration) -> Self {
        self.series_timeout = Some(timeout);
        self
    }

    pub fn with_forecast_horizon(mut self, horizon: usize) -> Self {
        self.forecast_horizon = horizon;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.forecast_horizon == 0 {
            return Err(PipelineError::InvalidParameter(
                "forecast_horizon must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative cancellation for a running batch.
///
/// Workers check the flag before starting a series; an in-flight series
/// finishes normally. Series never started are reported as failed with a
/// cancellation reason.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::Relaxed)
    }
}

/// Per-series outcome status in the batch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesStatus {
    /// Every stage produced results.
    Succeeded,
    /// Some stage failed or was skipped, but results exist.
    Partial,
    /// Nothing usable was produced; the store holds no entry.
    Failed,
}

/// One row of the batch report.
#[derive(Debug, Clone)]
pub struct SeriesOutcome {
    pub key: SeriesKey,
    pub status: SeriesStatus,
    /// First limitation or failure hit, when any.
    pub reason: Option<String>,
    pub total_splits: usize,
    pub successful_splits: usize,
    pub failed_splits: usize,
    pub flagged_anomalies: usize,
    pub has_forecast: bool,
}

/// Report of a batch run: every series enumerated with its outcome, plus
/// the batch-level metric summary.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Outcomes in key order, covering accepted and rejected series alike.
    pub outcomes: Vec<SeriesOutcome>,
    /// Unweighted mean of per-series summaries; `None` when no series has
    /// backtest coverage.
    pub global: Option<GlobalSummary>,
    /// Whether the run was cancelled before completing all series.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn outcome(&self, key: &SeriesKey) -> Option<&SeriesOutcome> {
        self.outcomes.iter().find(|o| o.key == *key)
    }

    pub fn succeeded_count(&self) -> usize {
        self.count(SeriesStatus::Succeeded)
    }

    pub fn partial_count(&self) -> usize {
        self.count(SeriesStatus::Partial)
    }

    pub fn failed_count(&self) -> usize {
        self.count(SeriesStatus::Failed)
    }

    fn count(&self, status: SeriesStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

/// Run the batch pipeline over a partitioned table.
///
/// Each accepted series runs its full pipeline on a worker; series rejected
/// at partition time appear in the report as failed with their rejection
/// reason. Completed series are merged into `store` exactly once; a series
/// that fails outright stores nothing.
pub fn run_batch(
    partition: &PartitionOutcome,
    factory: &ModelFactory,
    backtest: &BacktestConfig,
    anomaly: &AnomalyConfig,
    batch: &BatchConfig,
    store: &ResultStore,
    cancel: Option<&CancelFlag>,
) -> Result<BatchReport> {
    backtest.validate()?;
    anomaly.validate()?;
    batch.validate()?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(batch.workers)
        .build()
        .map_err(|e| PipelineError::InvalidParameter(format!("worker pool: {e}")))?;

    info!(
        series = partition.series.len(),
        rejected = partition.rejected.len(),
        workers = batch.workers,
        "starting batch run"
    );

    let results: Vec<(SeriesOutcome, Option<SeriesSummary>)> = pool.install(|| {
        partition
            .series
            .par_iter()
            .map(|series| process_series(series, factory, backtest, anomaly, batch, store, cancel))
            .collect()
    });

    let mut outcomes = Vec::with_capacity(results.len() + partition.rejected.len());
    let mut summaries = Vec::new();
    for (outcome, summary) in results {
        outcomes.push(outcome);
        summaries.extend(summary);
    }
    for (key, reason) in &partition.rejected {
        outcomes.push(failed_outcome(*key, reason));
    }
    outcomes.sort_by_key(|o| o.key);

    Ok(BatchReport {
        outcomes,
        global: summarize_global(&summaries),
        cancelled: cancel.is_some_and(|c| c.is_cancelled()),
    })
}

/// The complete pipeline for one series. Returns the report row and, when
/// backtesting produced anything, the series metric summary.
fn process_series(
    series: &Series,
    factory: &ModelFactory,
    backtest: &BacktestConfig,
    anomaly: &AnomalyConfig,
    batch: &BatchConfig,
    store: &ResultStore,
    cancel: Option<&CancelFlag>,
) -> (SeriesOutcome, Option<SeriesSummary>) {
    let key = series.key();

    if cancel.is_some_and(|c| c.is_cancelled()) {
        return (failed_outcome(key, &PipelineError::Cancelled), None);
    }

    let deadline = batch.series_timeout.map(|t| Instant::now() + t);
    let splits = generate_splits(series.len(), backtest);
    let mut limitation: Option<PipelineError> = None;

    let backtests = if splits.is_empty() {
        limitation = Some(PipelineError::NoValidSplits);
        Vec::new()
    } else {
        match backtest_series(series, &splits, factory, deadline) {
            Ok(results) => results,
            Err(err) => {
                warn!(series = %key, error = %err, "series backtest aborted");
                return (failed_outcome(key, &err), None);
            }
        }
    };

    let split_metrics: Vec<SplitMetrics> =
        backtests.iter().filter_map(|r| r.metrics.clone()).collect();
    let successful_splits = split_metrics.len();
    let failed_splits = backtests.len() - successful_splits;
    let summary = summarize_series(key, &split_metrics, splits.len());

    let anomalies = match check_deadline(deadline).and_then(|_| detect_anomalies(series, anomaly))
    {
        Ok(records) => records,
        Err(PipelineError::TimedOut) => {
            warn!(series = %key, "series timed out before anomaly scoring");
            return (failed_outcome(key, &PipelineError::TimedOut), None);
        }
        Err(err) => {
            warn!(series = %key, error = %err, "anomaly detection skipped");
            limitation.get_or_insert(err);
            Vec::new()
        }
    };
    let flagged_anomalies = anomalies.iter().filter(|r| r.flagged).count();

    let forecast =
        match final_forecast(series, factory, batch.forecast_horizon, deadline) {
            Ok(forecast) => Some(forecast),
            Err(PipelineError::TimedOut) => {
                warn!(series = %key, "series timed out before final forecast");
                return (failed_outcome(key, &PipelineError::TimedOut), None);
            }
            Err(err) => {
                warn!(series = %key, error = %err, "final forecast failed");
                limitation.get_or_insert(err);
                None
            }
        };

    let clean = limitation.is_none() && failed_splits == 0 && !splits.is_empty();
    let produced_something =
        successful_splits > 0 || !anomalies.is_empty() || forecast.is_some();
    let status = if clean && forecast.is_some() {
        SeriesStatus::Succeeded
    } else if produced_something {
        SeriesStatus::Partial
    } else {
        SeriesStatus::Failed
    };

    let reason = limitation.map(|e| e.to_string()).or_else(|| {
        backtests
            .iter()
            .find_map(|r| r.failure.clone())
    });

    if status != SeriesStatus::Failed {
        store.insert(SeriesResult {
            key,
            label: series.label().map(str::to_string),
            forecast: forecast.clone(),
            backtests,
            summary: summary.clone(),
            anomalies,
        });
    }

    let outcome = SeriesOutcome {
        key,
        status,
        reason,
        total_splits: splits.len(),
        successful_splits,
        failed_splits,
        flagged_anomalies,
        has_forecast: forecast.is_some(),
    };
    (outcome, summary)
}

fn failed_outcome(key: SeriesKey, reason: &PipelineError) -> SeriesOutcome {
    SeriesOutcome {
        key,
        status: SeriesStatus::Failed,
        reason: Some(reason.to_string()),
        total_splits: 0,
        successful_splits: 0,
        failed_splits: 0,
        flagged_anomalies: 0,
        has_forecast: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoxedForecaster, Naive};
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn make_series(store: u32, item: u32, values: Vec<f64>) -> Series {
        let base = Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..values.len())
            .map(|i| base + ChronoDuration::days(i as i64))
            .collect();
        Series::new(SeriesKey::new(store, item), timestamps, values).unwrap()
    }

    fn outcome_of(series: Vec<Series>) -> PartitionOutcome {
        PartitionOutcome {
            series,
            rejected: Vec::new(),
        }
    }

    fn naive_factory() -> ModelFactory {
        Arc::new(|| Box::new(Naive::new()) as BoxedForecaster)
    }

    fn small_configs() -> (BacktestConfig, AnomalyConfig, BatchConfig) {
        (
            BacktestConfig::new(14, 7),
            AnomalyConfig::default(),
            BatchConfig::new().with_forecast_horizon(7),
        )
    }

    fn wavy(n: usize, phase: f64) -> Vec<f64> {
        (0..n)
            .map(|i| 50.0 + 5.0 * ((i as f64 + phase) * 0.7).sin())
            .collect()
    }

    #[test]
    fn healthy_batch_succeeds_everywhere() {
        let partition = outcome_of(vec![
            make_series(1, 1, wavy(42, 0.0)),
            make_series(1, 2, wavy(42, 2.0)),
            make_series(2, 1, wavy(42, 4.0)),
        ]);
        let (bt, an, batch) = small_configs();
        let store = ResultStore::new();

        let report =
            run_batch(&partition, &naive_factory(), &bt, &an, &batch, &store, None).unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.succeeded_count(), 3);
        assert!(!report.cancelled);
        assert!(report.global.is_some());
        assert_eq!(store.len(), 3);

        let result = store.get(&SeriesKey::new(1, 1)).unwrap();
        assert_eq!(result.backtests.len(), 4);
        assert!(result.forecast.is_some());
        assert_eq!(result.anomalies.len(), 42);
    }

    #[test]
    fn report_covers_rejected_series() {
        let partition = PartitionOutcome {
            series: vec![make_series(1, 1, wavy(42, 0.0))],
            rejected: vec![(
                SeriesKey::new(9, 9),
                PipelineError::InsufficientHistory { needed: 21, got: 3 },
            )],
        };
        let (bt, an, batch) = small_configs();
        let store = ResultStore::new();

        let report =
            run_batch(&partition, &naive_factory(), &bt, &an, &batch, &store, None).unwrap();

        assert_eq!(report.outcomes.len(), 2);
        let rejected = report.outcome(&SeriesKey::new(9, 9)).unwrap();
        assert_eq!(rejected.status, SeriesStatus::Failed);
        assert!(rejected.reason.as_deref().unwrap().contains("insufficient history"));
        assert!(store.get(&SeriesKey::new(9, 9)).is_none());
    }

    #[test]
    fn short_series_is_partial_with_no_valid_splits() {
        // Long enough for anomalies (two weeks) but not for one split.
        let partition = outcome_of(vec![make_series(1, 1, wavy(18, 0.0))]);
        let (bt, an, batch) = small_configs();
        let store = ResultStore::new();

        let report =
            run_batch(&partition, &naive_factory(), &bt, &an, &batch, &store, None).unwrap();

        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, SeriesStatus::Partial);
        assert_eq!(outcome.total_splits, 0);
        assert!(outcome.reason.as_deref().unwrap().contains("no valid splits"));
        assert!(outcome.has_forecast);
        // No backtest coverage means no contribution to the global summary.
        assert!(report.global.is_none());
        // The store still carries anomalies and the forecast.
        let stored = store.get(&SeriesKey::new(1, 1)).unwrap();
        assert!(stored.backtests.is_empty());
        assert_eq!(stored.anomalies.len(), 18);
    }

    #[test]
    fn pre_cancelled_batch_runs_nothing() {
        let partition = outcome_of(vec![
            make_series(1, 1, wavy(42, 0.0)),
            make_series(1, 2, wavy(42, 1.0)),
        ]);
        let (bt, an, batch) = small_configs();
        let store = ResultStore::new();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let report = run_batch(
            &partition,
            &naive_factory(),
            &bt,
            &an,
            &batch,
            &store,
            Some(&cancel),
        )
        .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.failed_count(), 2);
        assert!(store.is_empty());
        for outcome in &report.outcomes {
            assert!(outcome.reason.as_deref().unwrap().contains("cancelled"));
        }
    }

    #[test]
    fn zero_timeout_reports_timed_out_and_stores_nothing() {
        let partition = outcome_of(vec![make_series(1, 1, wavy(42, 0.0))]);
        let (bt, an, _) = small_configs();
        let batch = BatchConfig::new()
            .with_forecast_horizon(7)
            .with_series_timeout(Duration::ZERO);
        let store = ResultStore::new();

        let report =
            run_batch(&partition, &naive_factory(), &bt, &an, &batch, &store, None).unwrap();

        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, SeriesStatus::Failed);
        assert!(outcome.reason.as_deref().unwrap().contains("wall-clock"));
        assert!(store.is_empty());
        assert!(report.global.is_none());
    }

    #[test]
    fn bounded_pool_matches_serial_results() {
        let partition = outcome_of(
            (0..6)
                .map(|i| make_series(1, i, wavy(42, i as f64)))
                .collect(),
        );
        let (bt, an, _) = small_configs();

        let serial_store = ResultStore::new();
        let serial = run_batch(
            &partition,
            &naive_factory(),
            &bt,
            &an,
            &BatchConfig::new().with_forecast_horizon(7).with_workers(1),
            &serial_store,
            None,
        )
        .unwrap();

        let pooled_store = ResultStore::new();
        let pooled = run_batch(
            &partition,
            &naive_factory(),
            &bt,
            &an,
            &BatchConfig::new().with_forecast_horizon(7).with_workers(4),
            &pooled_store,
            None,
        )
        .unwrap();

        assert_eq!(serial.global, pooled.global);
        for key in serial_store.keys() {
            assert_eq!(serial_store.get(&key), pooled_store.get(&key));
        }
    }

    #[test]
    fn invalid_config_aborts_before_any_work() {
        let partition = outcome_of(vec![make_series(1, 1, wavy(42, 0.0))]);
        let (_, an, batch) = small_configs();
        let bad = BacktestConfig::new(14, 7).with_step(3);
        let store = ResultStore::new();

        assert!(matches!(
            run_batch(&partition, &naive_factory(), &bad, &an, &batch, &store, None),
            Err(PipelineError::InvalidParameter(_))
        ));
        assert!(store.is_empty());
    }
}
