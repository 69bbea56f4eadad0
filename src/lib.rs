//! # demand-forecast
//!
//! Batch forecasting and validation for many independent product-store
//! demand series, plus decomposition-based anomaly detection.
//!
//! The pipeline partitions a combined observation table into per-series
//! daily sequences, backtests a pluggable forecasting model at rolling
//! origins, aggregates accuracy metrics across series and splits, scores
//! each series' residuals for anomalies, and stores everything in a keyed
//! result store for presentation to query.
//!
//! Per-split and per-series failures are isolated and reported; only
//! malformed input or invalid configuration aborts a batch.

pub mod anomaly;
pub mod core;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod store;

pub use error::{PipelineError, Result};

pub mod prelude {
    pub use crate::anomaly::{detect_anomalies, AnomalyConfig, AnomalyRecord};
    pub use crate::core::{Forecast, Observation, Series, SeriesKey};
    pub use crate::error::{PipelineError, Result};
    pub use crate::metrics::{GlobalSummary, SeriesSummary, SplitMetrics};
    pub use crate::models::{BoxedForecaster, Forecaster, ModelFactory};
    pub use crate::pipeline::{
        partition, run_batch, BacktestConfig, BatchConfig, BatchReport, PartitionConfig,
    };
    pub use crate::store::{ResultStore, SeriesResult};
}
