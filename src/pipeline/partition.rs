//! Series partitioner: combined observation table to per-series sequences.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::core::{Observation, Series, SeriesKey};
use crate::error::{PipelineError, Result};

/// How calendar gaps are filled after partitioning.
///
/// Chosen once and applied consistently; alignment is never an incidental
/// side effect of a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GapFillPolicy {
    /// Missing days carry zero demand.
    #[default]
    Zero,
    /// Missing days repeat the previous observed value.
    ForwardFill,
}

/// Configuration for partitioning the combined table.
#[derive(Debug, Clone)]
pub struct PartitionConfig {
    /// Gap-filling policy for missing calendar days.
    pub gap_fill: GapFillPolicy,
    /// Minimum gap-filled length a series needs to stay in the batch;
    /// shorter series are rejected with `InsufficientHistory`. Callers
    /// derive this from the backtest configuration (`T0 + H`).
    pub min_len: usize,
}

impl PartitionConfig {
    pub fn new(min_len: usize) -> Self {
        Self {
            gap_fill: GapFillPolicy::default(),
            min_len,
        }
    }

    pub fn with_gap_fill(mut self, policy: GapFillPolicy) -> Self {
        self.gap_fill = policy;
        self
    }
}

/// Result of partitioning: the usable series plus the rejected keys.
#[derive(Debug)]
pub struct PartitionOutcome {
    /// Usable series in key order, sorted, deduplicated, gap-free.
    pub series: Vec<Series>,
    /// Series excluded from downstream processing, with the reason.
    pub rejected: Vec<(SeriesKey, PipelineError)>,
}

/// Partition a combined observation table into per-series daily sequences.
///
/// Input rows need not be sorted or gap-free. Timestamps are truncated to
/// their UTC day; multiple rows landing on the same (key, day) are summed.
/// Gaps in the resulting calendar are filled per the configured policy.
///
/// A non-finite value is a malformed input and aborts partitioning with
/// `InvalidObservation`; a too-short series is reported in
/// `PartitionOutcome::rejected` without aborting the batch.
pub fn partition(
    rows: &[Observation],
    labels: &HashMap<SeriesKey, String>,
    config: &PartitionConfig,
) -> Result<PartitionOutcome> {
    let mut grouped: BTreeMap<SeriesKey, BTreeMap<NaiveDate, f64>> = BTreeMap::new();

    for row in rows {
        if !row.value.is_finite() {
            return Err(PipelineError::InvalidObservation {
                key: row.key,
                timestamp: row.timestamp,
                reason: "value is not finite".to_string(),
            });
        }
        let day = row.timestamp.date_naive();
        *grouped.entry(row.key).or_default().entry(day).or_insert(0.0) += row.value;
    }

    let mut series = Vec::new();
    let mut rejected = Vec::new();

    for (key, days) in grouped {
        let (timestamps, values) = fill_calendar(&days, config.gap_fill);

        if values.len() < config.min_len {
            rejected.push((
                key,
                PipelineError::InsufficientHistory {
                    needed: config.min_len,
                    got: values.len(),
                },
            ));
            continue;
        }

        let mut s = Series::new(key, timestamps, values)?;
        if let Some(label) = labels.get(&key) {
            s.set_label(label.clone());
        }
        series.push(s);
    }

    Ok(PartitionOutcome { series, rejected })
}

/// Expand a day-keyed map over its full calendar range, filling gaps.
fn fill_calendar(
    days: &BTreeMap<NaiveDate, f64>,
    policy: GapFillPolicy,
) -> (Vec<DateTime<Utc>>, Vec<f64>) {
    let (first, last) = match (days.keys().next(), days.keys().next_back()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return (Vec::new(), Vec::new()),
    };

    let span = (last - first).num_days();
    let mut timestamps = Vec::with_capacity(span as usize + 1);
    let mut values = Vec::with_capacity(span as usize + 1);
    // The first day is always observed, so forward fill has a seed.
    let mut previous = 0.0;

    for offset in 0..=span {
        let day = first + Duration::days(offset);
        timestamps.push(day.and_time(NaiveTime::MIN).and_utc());
        let value = match days.get(&day) {
            Some(&v) => v,
            None => match policy {
                GapFillPolicy::Zero => 0.0,
                GapFillPolicy::ForwardFill => previous,
            },
        };
        previous = value;
        values.push(value);
    }

    (timestamps, values)
}
