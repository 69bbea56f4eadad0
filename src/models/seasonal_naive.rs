//! Seasonal naive model: repeat the value from one seasonal cycle back.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::core::{ForecastBands, Series};
use crate::error::{PipelineError, Result};
use crate::models::traits::{check_history, check_horizon};
use crate::models::Forecaster;

/// Seasonal naive forecaster.
///
/// Each forecast step repeats the observation from the same position in the
/// last complete seasonal cycle.
#[derive(Debug, Clone)]
pub struct SeasonalNaive {
    period: usize,
    level: f64,
    last_cycle: Option<Vec<f64>>,
    sigma: Option<f64>,
}

impl SeasonalNaive {
    /// Create a model with the given seasonal period.
    pub fn new(period: usize) -> Self {
        Self {
            period,
            level: 0.95,
            last_cycle: None,
            sigma: None,
        }
    }

    /// Set the interval confidence level (default 0.95).
    pub fn with_level(mut self, level: f64) -> Self {
        self.level = level;
        self
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Forecaster for SeasonalNaive {
    fn fit(&mut self, series: &Series) -> Result<()> {
        if self.period == 0 {
            return Err(PipelineError::ModelFit(
                "seasonal period must be positive".to_string(),
            ));
        }
        let values = check_history(series, self.period + 1)?;
        let n = values.len();

        self.last_cycle = Some(values[n - self.period..].to_vec());

        // Residuals against the seasonal lag.
        let sq_sum: f64 = (self.period..n)
            .map(|i| (values[i] - values[i - self.period]).powi(2))
            .sum();
        self.sigma = Some((sq_sum / (n - self.period) as f64).sqrt());

        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<ForecastBands> {
        check_horizon(horizon)?;
        let cycle = self
            .last_cycle
            .as_ref()
            .ok_or_else(|| PipelineError::ModelPredict("model has not been fitted".to_string()))?;
        let sigma = self.sigma.unwrap_or(0.0);

        let normal = Normal::new(0.0, 1.0).unwrap();
        let z = normal.inverse_cdf((1.0 + self.level) / 2.0);

        let mut point = Vec::with_capacity(horizon);
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        for h in 0..horizon {
            let value = cycle[h % self.period];
            // Uncertainty grows with the number of completed cycles ahead.
            let cycles_ahead = (h / self.period + 1) as f64;
            let se = sigma * cycles_ahead.sqrt();
            point.push(value);
            lower.push(value - z * se);
            upper.push(value + z * se);
        }

        ForecastBands::new(point, lower, upper)
    }

    fn name(&self) -> &str {
        "SeasonalNaive"
    }
}
