//! Naive forecasting model: repeat the last observed value.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::core::{ForecastBands, Series};
use crate::error::{PipelineError, Result};
use crate::models::traits::{check_history, check_horizon};
use crate::models::Forecaster;

/// Naive forecaster.
///
/// Forecast is the last observation; uncertainty comes from the standard
/// deviation of the one-step differences and widens with sqrt(h).
#[derive(Debug, Clone)]
pub struct Naive {
    level: f64,
    last_value: Option<f64>,
    sigma: Option<f64>,
}

impl Naive {
    pub fn new() -> Self {
        Self {
            level: 0.95,
            last_value: None,
            sigma: None,
        }
    }

    /// Set the interval confidence level (default 0.95).
    pub fn with_level(mut self, level: f64) -> Self {
        self.level = level;
        self
    }
}

impl Default for Naive {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster for Naive {
    fn fit(&mut self, series: &Series) -> Result<()> {
        let values = check_history(series, 2)?;

        self.last_value = values.last().copied();

        // One-step-ahead residuals are the first differences.
        let sq_sum: f64 = values.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
        self.sigma = Some((sq_sum / (values.len() - 1) as f64).sqrt());

        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<ForecastBands> {
        check_horizon(horizon)?;
        let last = self
            .last_value
            .ok_or_else(|| PipelineError::ModelPredict("model has not been fitted".to_string()))?;
        let sigma = self.sigma.unwrap_or(0.0);

        let normal = Normal::new(0.0, 1.0).unwrap();
        let z = normal.inverse_cdf((1.0 + self.level) / 2.0);

        let mut point = Vec::with_capacity(horizon);
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        for h in 1..=horizon {
            let se = sigma * (h as f64).sqrt();
            point.push(last);
            lower.push(last - z * se);
            upper.push(last + z * se);
        }

        ForecastBands::new(point, lower, upper)
    }

    fn name(&self) -> &str {
        "Naive"
    }
}
