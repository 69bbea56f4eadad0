//! Error types for the demand-forecast pipeline.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::SeriesKey;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while partitioning, backtesting, or scoring.
///
/// Conditions up to the series level are recoverable: they are recorded in
/// the affected `BacktestResult` or `BatchReport` entry and never abort the
/// batch. `InvalidParameter`, `InvalidObservation`, and `Storage` are fatal
/// to the run that raised them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Series has too few observations to form even one train/test split.
    #[error("insufficient history: need at least {needed} observations, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    /// No valid rolling origin exists for the series.
    #[error("no valid splits for series length")]
    NoValidSplits,

    /// Model training failed on the given history.
    #[error("model fit failed: {0}")]
    ModelFit(String),

    /// Model prediction failed for the requested horizon.
    #[error("model predict failed: {0}")]
    ModelPredict(String),

    /// Series exceeded its wall-clock budget.
    #[error("series exceeded its wall-clock budget")]
    TimedOut,

    /// Batch was cancelled before this series started.
    #[error("batch cancelled before series started")]
    Cancelled,

    /// Series is too short for the configured seasonal period.
    #[error("seasonal period {period} too long for series of length {len}")]
    SeasonalPeriodTooLong { period: usize, len: usize },

    /// Invalid configuration value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Malformed input row; identifies the offending observation.
    #[error("invalid observation for series {key} at {timestamp}: {reason}")]
    InvalidObservation {
        key: SeriesKey,
        timestamp: DateTime<Utc>,
        reason: String,
    },

    /// Input data is empty where at least one point is required.
    #[error("empty input data")]
    EmptyData,

    /// Two sequences that must align have different lengths.
    #[error("length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    /// Result store snapshot could not be serialized or deserialized.
    #[error("storage error: {0}")]
    Storage(String),
}

impl PipelineError {
    /// Whether the condition is recoverable at the series or split level.
    ///
    /// Recoverable conditions are recorded inline and never abort the batch;
    /// everything else aborts the run that raised it.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PipelineError::InvalidParameter(_)
                | PipelineError::InvalidObservation { .. }
                | PipelineError::Storage(_)
        )
    }
}
