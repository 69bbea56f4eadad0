//! Random walk with drift: last value plus an average-change trend.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::core::{ForecastBands, Series};
use crate::error::{PipelineError, Result};
use crate::models::traits::{check_history, check_horizon};
use crate::models::Forecaster;

/// Random walk with drift forecaster.
///
/// Forecast is `y[n] + h * drift` where drift is the mean first difference.
#[derive(Debug, Clone)]
pub struct Drift {
    level: f64,
    last_value: Option<f64>,
    drift: Option<f64>,
    sigma: Option<f64>,
}

impl Drift {
    pub fn new() -> Self {
        Self {
            level: 0.95,
            last_value: None,
            drift: None,
            sigma: None,
        }
    }

    /// Set the interval confidence level (default 0.95).
    pub fn with_level(mut self, level: f64) -> Self {
        self.level = level;
        self
    }

    /// Estimated drift, once fitted.
    pub fn drift(&self) -> Option<f64> {
        self.drift
    }
}

impl Default for Drift {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster for Drift {
    fn fit(&mut self, series: &Series) -> Result<()> {
        let values = check_history(series, 2)?;
        let n = values.len();

        let drift = (values[n - 1] - values[0]) / (n - 1) as f64;
        self.last_value = Some(values[n - 1]);
        self.drift = Some(drift);

        // Residuals against the drift-adjusted one-step forecast.
        let sq_sum: f64 = values
            .windows(2)
            .map(|w| (w[1] - w[0] - drift).powi(2))
            .sum();
        self.sigma = Some((sq_sum / (n - 1) as f64).sqrt());

        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<ForecastBands> {
        check_horizon(horizon)?;
        let (last, drift) = match (self.last_value, self.drift) {
            (Some(last), Some(drift)) => (last, drift),
            _ => {
                return Err(PipelineError::ModelPredict(
                    "model has not been fitted".to_string(),
                ))
            }
        };
        let sigma = self.sigma.unwrap_or(0.0);

        let normal = Normal::new(0.0, 1.0).unwrap();
        let z = normal.inverse_cdf((1.0 + self.level) / 2.0);

        let mut point = Vec::with_capacity(horizon);
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        for h in 1..=horizon {
            let pred = last + h as f64 * drift;
            let se = sigma * (h as f64).sqrt();
            point.push(pred);
            lower.push(pred - z * se);
            upper.push(pred + z * se);
        }

        ForecastBands::new(point, lower, upper)
    }

    fn name(&self) -> &str {
        "Drift"
    }
}
