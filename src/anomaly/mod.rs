//! Anomaly detection over decomposed series residuals.
//!
//! Each series is decomposed into trend, seasonal, and residual components;
//! only the residuals are scored — removing trend and seasonality is the
//! point of the decomposition. An observation is flagged when its outlier
//! score exceeds the configured threshold, or when its residual magnitude
//! exceeds `k` standard deviations of the series' residual distribution.

mod decompose;
mod forest;

use serde::{Deserialize, Serialize};

use crate::core::{Series, SeriesKey};
use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};

pub use decompose::{decompose, Decomposition};
use forest::isolation_scores;

/// Outlier model applied to the residual distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMethod {
    /// Seeded isolation forest; scores in [0, 1].
    IsolationForest,
    /// Modified z-score on the median absolute deviation; cheap, no
    /// randomness, scores in units of robust standard deviations.
    MadZScore,
}

/// Configuration for the anomaly detector.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyConfig {
    /// Seasonal period of the decomposition (default 7, weekly).
    pub period: usize,
    /// Residual scoring method.
    pub method: ScoreMethod,
    /// Score above which an observation is flagged. Interpreted in the
    /// method's own scale.
    pub score_threshold: f64,
    /// Secondary rule: flag when |residual| exceeds `sigma_k` standard
    /// deviations of the residual distribution.
    pub sigma_k: f64,
    /// Trees in the isolation forest.
    pub n_trees: usize,
    /// Per-tree subsample cap for the isolation forest.
    pub sample_size: usize,
    /// Seed for the forest; fixed so repeated runs are bit-identical.
    pub seed: u64,
}

impl AnomalyConfig {
    /// Isolation-forest scoring with the default threshold.
    pub fn isolation_forest(period: usize) -> Self {
        Self {
            period,
            method: ScoreMethod::IsolationForest,
            score_threshold: 0.6,
            sigma_k: 3.0,
            n_trees: 100,
            sample_size: 256,
            seed: 42,
        }
    }

    /// MAD z-score scoring with the conventional 3.5 threshold.
    pub fn mad_z_score(period: usize) -> Self {
        Self {
            method: ScoreMethod::MadZScore,
            score_threshold: 3.5,
            ..Self::isolation_forest(period)
        }
    }

    pub fn with_score_threshold(mut self, threshold: f64) -> Self {
        self.score_threshold = threshold;
        self
    }

    pub fn with_sigma_k(mut self, k: f64) -> Self {
        self.sigma_k = k;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.period < 2 {
            return Err(PipelineError::InvalidParameter(
                "anomaly period must be at least 2".to_string(),
            ));
        }
        if !self.score_threshold.is_finite() {
            return Err(PipelineError::InvalidParameter(
                "score_threshold must be finite".to_string(),
            ));
        }
        if self.sigma_k <= 0.0 {
            return Err(PipelineError::InvalidParameter(
                "sigma_k must be positive".to_string(),
            ));
        }
        if self.n_trees == 0 || self.sample_size < 2 {
            return Err(PipelineError::InvalidParameter(
                "isolation forest needs at least one tree and a sample of 2".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self::isolation_forest(7)
    }
}

/// Anomaly verdict for one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub key: SeriesKey,
    pub timestamp: DateTime<Utc>,
    /// Residual after removing trend and seasonal components.
    pub residual: f64,
    /// Outlier score of the residual.
    pub score: f64,
    pub flagged: bool,
}

/// Score every observation of a series.
///
/// Fails with `SeasonalPeriodTooLong` when the series cannot support the
/// configured period; callers skip the series without aborting the batch.
/// Records are returned in timestamp order, one per observation.
pub fn detect_anomalies(series: &Series, config: &AnomalyConfig) -> Result<Vec<AnomalyRecord>> {
    let decomposition = decompose(series.values(), config.period)?;
    let residual = &decomposition.residual;

    let scores = match config.method {
        ScoreMethod::IsolationForest => {
            isolation_scores(residual, config.n_trees, config.sample_size, config.seed)
        }
        ScoreMethod::MadZScore => mad_z_scores(residual),
    };

    let sigma = std_dev(residual);
    let sigma_cut = config.sigma_k * sigma;

    let records = series
        .timestamps()
        .iter()
        .zip(residual.iter().zip(scores.iter()))
        .map(|(&timestamp, (&residual, &score))| AnomalyRecord {
            key: series.key(),
            timestamp,
            residual,
            score,
            flagged: score > config.score_threshold
                || (sigma_cut > 0.0 && residual.abs() > sigma_cut),
        })
        .collect();

    Ok(records)
}

/// Modified z-scores from the median absolute deviation.
fn mad_z_scores(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    let center = median_of(&mut sorted);

    let mut deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    let mad = median_of(&mut deviations);

    // 0.6745 is the 0.75 quantile of the standard normal; it rescales MAD
    // to a standard-deviation-comparable unit.
    let scale = mad / 0.6745;
    if scale < 1e-12 {
        return vec![0.0; values.len()];
    }

    values.iter().map(|v| ((v - center) / scale).abs()).collect()
}

fn median_of(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    }
}

/// Sample standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}
