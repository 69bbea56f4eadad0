//! Series identity and per-series observation sequences.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Composite identity of one time series: a store and an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub store: u32,
    pub item: u32,
}

impl SeriesKey {
    pub fn new(store: u32, item: u32) -> Self {
        Self { store, item }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.store, self.item)
    }
}

/// One row of the combined input table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub key: SeriesKey,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Observation {
    pub fn new(key: SeriesKey, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            key,
            timestamp,
            value,
        }
    }
}

/// An ordered, gap-free sequence of observations for one series.
///
/// Construction validates that timestamps are strictly increasing; the
/// partitioner additionally guarantees a gap-free daily calendar before a
/// series is handed downstream. Downstream components hold the series
/// read-only.
#[derive(Debug, Clone)]
pub struct Series {
    key: SeriesKey,
    label: Option<String>,
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
    frequency: Duration,
}

impl Series {
    /// Create a series at the default daily frequency.
    pub fn new(
        key: SeriesKey,
        timestamps: Vec<DateTime<Utc>>,
        values: Vec<f64>,
    ) -> Result<Self> {
        Self::with_frequency(key, timestamps, values, Duration::days(1))
    }

    /// Create a series with an explicit observation frequency.
    pub fn with_frequency(
        key: SeriesKey,
        timestamps: Vec<DateTime<Utc>>,
        values: Vec<f64>,
        frequency: Duration,
    ) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(PipelineError::LengthMismatch {
                expected: timestamps.len(),
                got: values.len(),
            });
        }
        for pair in timestamps.windows(2) {
            if pair[1] <= pair[0] {
                return Err(PipelineError::InvalidObservation {
                    key,
                    timestamp: pair[1],
                    reason: "timestamps must be strictly increasing".to_string(),
                });
            }
        }

        Ok(Self {
            key,
            label: None,
            timestamps,
            values,
            frequency,
        })
    }

    pub fn key(&self) -> SeriesKey {
        self.key
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    /// Extract the half-open index range `[start, end)` as a new series.
    pub fn slice(&self, start: usize, end: usize) -> Result<Series> {
        if start > end {
            return Err(PipelineError::InvalidParameter(
                "slice start must be <= end".to_string(),
            ));
        }
        if end > self.len() {
            return Err(PipelineError::InvalidParameter(format!(
                "slice end {} exceeds series length {}",
                end,
                self.len()
            )));
        }

        Ok(Series {
            key: self.key,
            label: self.label.clone(),
            timestamps: self.timestamps[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
            frequency: self.frequency,
        })
    }

    /// Timestamps for `horizon` steps past the end of the series.
    ///
    /// Used to stamp forecast points; requires a non-empty series.
    pub fn future_timestamps(&self, horizon: usize) -> Result<Vec<DateTime<Utc>>> {
        let last = *self.timestamps.last().ok_or(PipelineError::EmptyData)?;
        Ok((1..=horizon as i64).map(|h| last + self.frequency * h as i32).collect())
    }

    /// Whether every value is finite.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}
