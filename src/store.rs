//! Keyed store for per-series pipeline results.
//!
//! Workers insert a series' complete result exactly once per batch run;
//! recomputation overwrites the entry wholesale. Readers get clones, never
//! references into the store, so presentation code cannot observe partial
//! state.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::anomaly::AnomalyRecord;
use crate::core::{Forecast, SeriesKey};
use crate::error::{PipelineError, Result};
use crate::metrics::SeriesSummary;
use crate::pipeline::BacktestResult;

/// Everything the pipeline produced for one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesResult {
    pub key: SeriesKey,
    pub label: Option<String>,
    /// Latest full-history forecast, when one could be produced.
    pub forecast: Option<Forecast>,
    /// Backtest results in split order.
    pub backtests: Vec<BacktestResult>,
    /// Per-series metric summary over successful splits.
    pub summary: Option<SeriesSummary>,
    /// Anomaly records in timestamp order.
    pub anomalies: Vec<AnomalyRecord>,
}

/// Thread-safe result store keyed by series.
#[derive(Debug, Default)]
pub struct ResultStore {
    entries: RwLock<BTreeMap<SeriesKey, SeriesResult>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a series result, replacing any previous entry wholesale.
    pub fn insert(&self, result: SeriesResult) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(result.key, result);
    }

    /// Fetch a clone of the series' entry, if present.
    pub fn get(&self, key: &SeriesKey) -> Option<SeriesResult> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    /// Keys of all stored series, in order.
    pub fn keys(&self) -> Vec<SeriesKey> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize the full store to a JSON snapshot.
    ///
    /// Every stored entity round-trips losslessly: timestamps, floating
    /// point values, and flags are preserved exactly.
    pub fn to_json(&self) -> Result<String> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let snapshot: Vec<&SeriesResult> = entries.values().collect();
        serde_json::to_string(&snapshot).map_err(|e| PipelineError::Storage(e.to_string()))
    }

    /// Rebuild a store from a JSON snapshot.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Vec<SeriesResult> =
            serde_json::from_str(json).map_err(|e| PipelineError::Storage(e.to_string()))?;

        let store = Self::new();
        for result in snapshot {
            store.insert(result);
        }
        Ok(store)
    }
}
