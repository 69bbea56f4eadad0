//! Robust seasonal-trend decomposition.
//!
//! Splits a series into trend, seasonal, and residual components using
//! median estimators: a centered moving median for the trend and
//! per-cycle-position medians for the seasonal pattern. Medians keep single
//! extreme observations out of the trend and seasonal components, so an
//! outlier survives intact in the residual where the scorer can see it.

use crate::error::{PipelineError, Result};

/// Additive decomposition of a series: `value = trend + seasonal + residual`.
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
}

/// Decompose `values` with a fixed seasonal period.
///
/// Requires at least two full cycles; shorter input fails with
/// `SeasonalPeriodTooLong` so the caller can skip the series.
pub fn decompose(values: &[f64], period: usize) -> Result<Decomposition> {
    if period < 2 {
        return Err(PipelineError::InvalidParameter(
            "seasonal period must be at least 2".to_string(),
        ));
    }
    if values.len() < 2 * period {
        return Err(PipelineError::SeasonalPeriodTooLong {
            period,
            len: values.len(),
        });
    }

    // Odd window so the median is centered on the observation.
    let window = if period % 2 == 0 { period + 1 } else { period };
    let mut trend = moving_median(values, window);

    let detrended: Vec<f64> = values
        .iter()
        .zip(trend.iter())
        .map(|(v, t)| v - t)
        .collect();

    // Seasonal effect per cycle position, centered so the pattern carries
    // no level of its own; the level moves into the trend, not the residual.
    let mut position_effects = vec![0.0; period];
    let mut scratch = Vec::new();
    for (pos, effect) in position_effects.iter_mut().enumerate() {
        scratch.clear();
        scratch.extend(detrended.iter().skip(pos).step_by(period));
        *effect = median(&mut scratch);
    }
    let effect_mean: f64 = position_effects.iter().sum::<f64>() / period as f64;
    for effect in &mut position_effects {
        *effect -= effect_mean;
    }
    for t in &mut trend {
        *t += effect_mean;
    }

    let seasonal: Vec<f64> = (0..values.len())
        .map(|i| position_effects[i % period])
        .collect();

    let residual: Vec<f64> = values
        .iter()
        .zip(trend.iter())
        .zip(seasonal.iter())
        .map(|((v, t), s)| v - t - s)
        .collect();

    Ok(Decomposition {
        trend,
        seasonal,
        residual,
    })
}

/// Centered moving median.
///
/// Near the edges the window is shifted inward rather than shrunk, so every
/// window still spans a full seasonal cycle and the trend stays free of
/// seasonal bias at the boundaries.
fn moving_median(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let half = window / 2;
    let mut scratch = Vec::with_capacity(window);

    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half).min(n - window.min(n));
            let end = (start + window).min(n);
            scratch.clear();
            scratch.extend_from_slice(&values[start..end]);
            median(&mut scratch)
        })
        .collect()
}

/// Median of a scratch buffer; sorts in place.
fn median(values: &mut [f64]) -> f64 {
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
