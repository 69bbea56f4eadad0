//! Rolling-origin split generation for backtesting.

use std::ops::Range;

use crate::error::{PipelineError, Result};

/// Configuration for rolling-origin backtesting.
///
/// Origins are placed at `initial_window`, `initial_window + step`, ... for
/// as long as a full test window fits inside the history. The train window
/// always expands from the start of the series.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    /// Minimum initial training size (the first origin).
    pub initial_window: usize,
    /// Forecast horizon evaluated at each origin.
    pub horizon: usize,
    /// Distance between consecutive origins. Must be at least `horizon` so
    /// test windows tile or stride without overlapping.
    pub step: usize,
    /// Confidence level for prediction intervals.
    pub interval_level: f64,
}

impl BacktestConfig {
    /// Create a config with `step == horizon` (tiling test windows).
    pub fn new(initial_window: usize, horizon: usize) -> Self {
        Self {
            initial_window,
            horizon,
            step: horizon,
            interval_level: 0.95,
        }
    }

    /// Set the distance between consecutive origins.
    pub fn with_step(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    /// Set the prediction-interval confidence level.
    pub fn with_interval_level(mut self, level: f64) -> Self {
        self.interval_level = level;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.initial_window == 0 {
            return Err(PipelineError::InvalidParameter(
                "initial_window must be positive".to_string(),
            ));
        }
        if self.horizon == 0 {
            return Err(PipelineError::InvalidParameter(
                "horizon must be positive".to_string(),
            ));
        }
        if self.step < self.horizon {
            return Err(PipelineError::InvalidParameter(format!(
                "step {} must be >= horizon {} so test windows never overlap",
                self.step, self.horizon
            )));
        }
        if !(self.interval_level > 0.0 && self.interval_level < 1.0) {
            return Err(PipelineError::InvalidParameter(
                "interval_level must be in (0, 1)".to_string(),
            ));
        }
        Ok(())
    }

    /// Shortest series that yields at least one split.
    pub fn min_series_len(&self) -> usize {
        self.initial_window + self.horizon
    }
}

impl Default for BacktestConfig {
    fn default() -> Self {
        // Three years of initial history, quarterly origins, 90-day horizon.
        Self {
            initial_window: 1095,
            horizon: 90,
            step: 180,
            interval_level: 0.95,
        }
    }
}

/// One train/test pair at a rolling origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// Position in the series' split sequence, from zero.
    pub index: usize,
    /// First test index; the train window ends just before it.
    pub origin: usize,
    /// Train window `[0, origin)`.
    pub train: Range<usize>,
    /// Test window `[origin, origin + horizon)`.
    pub test: Range<usize>,
}

/// Generate the ordered splits for a series of length `len`.
///
/// Origins are strictly increasing and every test window lies entirely
/// within the available history. A series too short for even one split
/// yields an empty vector; callers report that as `NoValidSplits`.
pub fn generate_splits(len: usize, config: &BacktestConfig) -> Vec<Split> {
    let mut splits = Vec::new();
    let mut origin = config.initial_window;

    while origin + config.horizon <= len {
        splits.push(Split {
            index: splits.len(),
            origin,
            train: 0..origin,
            test: origin..origin + config.horizon,
        });
        origin += config.step;
    }

    splits
}
