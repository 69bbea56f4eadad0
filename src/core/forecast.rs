//! Forecast structures: raw model output and the stored, timestamped entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::SeriesKey;
use crate::error::{PipelineError, Result};

/// Raw output of a model's `predict`: point estimates with an uncertainty
/// interval per step. No timestamps; the controller attaches those.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastBands {
    point: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl ForecastBands {
    /// Build bands from equal-length point and bound vectors.
    pub fn new(point: Vec<f64>, lower: Vec<f64>, upper: Vec<f64>) -> Result<Self> {
        if lower.len() != point.len() {
            return Err(PipelineError::LengthMismatch {
                expected: point.len(),
                got: lower.len(),
            });
        }
        if upper.len() != point.len() {
            return Err(PipelineError::LengthMismatch {
                expected: point.len(),
                got: upper.len(),
            });
        }
        Ok(Self { point, lower, upper })
    }

    pub fn horizon(&self) -> usize {
        self.point.len()
    }

    pub fn point(&self) -> &[f64] {
        &self.point
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }
}

/// One forecast step: timestamp, point estimate, and interval bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// A stored forecast for one series. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    key: SeriesKey,
    model: String,
    points: Vec<ForecastPoint>,
}

impl Forecast {
    /// Assemble a forecast by stamping model bands with future timestamps.
    pub fn from_bands(
        key: SeriesKey,
        model: impl Into<String>,
        timestamps: Vec<DateTime<Utc>>,
        bands: &ForecastBands,
    ) -> Result<Self> {
        if timestamps.len() != bands.horizon() {
            return Err(PipelineError::LengthMismatch {
                expected: bands.horizon(),
                got: timestamps.len(),
            });
        }

        let points = timestamps
            .into_iter()
            .enumerate()
            .map(|(i, timestamp)| ForecastPoint {
                timestamp,
                value: bands.point()[i],
                lower: bands.lower()[i],
                upper: bands.upper()[i],
            })
            .collect();

        Ok(Self {
            key,
            model: model.into(),
            points,
        })
    }

    pub fn key(&self) -> SeriesKey {
        self.key
    }

    /// Name of the model that produced the forecast.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn horizon(&self) -> usize {
        self.points.len()
    }
}
