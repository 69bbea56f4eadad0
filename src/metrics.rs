//! Forecast accuracy metrics and their aggregation.
//!
//! Per-split metrics are computed over successfully matched (forecast,
//! actual) pairs only. Aggregation is unweighted at both levels: a series
//! summary is the mean over that series' successful splits, and the global
//! summary is the mean over series summaries, so long series cannot
//! dominate the batch aggregate.

use serde::{Deserialize, Serialize};

use crate::core::SeriesKey;
use crate::error::{PipelineError, Result};

/// Accuracy metrics for one evaluated split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitMetrics {
    /// Mean absolute error.
    pub mae: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// Mean absolute percentage error; `None` when any compared actual is
    /// zero (the ratio is undefined, not zero).
    pub mape: Option<f64>,
}

/// Compare a forecast against the actual test window.
///
/// A non-finite actual value excludes that point from all three metrics.
/// Fails with `EmptyData` if no finite pair remains, and with
/// `LengthMismatch` if the sequences do not align.
pub fn compute_split_metrics(actual: &[f64], predicted: &[f64]) -> Result<SplitMetrics> {
    if actual.len() != predicted.len() {
        return Err(PipelineError::LengthMismatch {
            expected: actual.len(),
            got: predicted.len(),
        });
    }

    let pairs: Vec<(f64, f64)> = actual
        .iter()
        .zip(predicted.iter())
        .filter(|(a, _)| a.is_finite())
        .map(|(&a, &p)| (a, p))
        .collect();

    if pairs.is_empty() {
        return Err(PipelineError::EmptyData);
    }

    let n = pairs.len() as f64;
    let mae = pairs.iter().map(|(a, p)| (a - p).abs()).sum::<f64>() / n;
    let mse = pairs.iter().map(|(a, p)| (a - p).powi(2)).sum::<f64>() / n;
    let rmse = mse.sqrt();

    let mape = if pairs.iter().any(|(a, _)| *a == 0.0) {
        None
    } else {
        let sum: f64 = pairs.iter().map(|(a, p)| ((a - p) / a).abs()).sum();
        Some(100.0 * sum / n)
    };

    Ok(SplitMetrics { mae, rmse, mape })
}

/// Per-series metric summary across successful splits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub key: SeriesKey,
    /// Splits generated for the series.
    pub total_splits: usize,
    /// Splits that produced metrics.
    pub successful_splits: usize,
    pub mae: f64,
    pub rmse: f64,
    /// Mean MAPE over the splits where it was defined.
    pub mape: Option<f64>,
}

/// Unweighted mean of split metrics for one series.
///
/// Returns `None` when no split succeeded: the series then has no backtest
/// coverage and must not be folded into the global summary as zero error.
pub fn summarize_series(
    key: SeriesKey,
    split_metrics: &[SplitMetrics],
    total_splits: usize,
) -> Option<SeriesSummary> {
    if split_metrics.is_empty() {
        return None;
    }

    let n = split_metrics.len() as f64;
    let mae = split_metrics.iter().map(|m| m.mae).sum::<f64>() / n;
    let rmse = split_metrics.iter().map(|m| m.rmse).sum::<f64>() / n;

    let mape_values: Vec<f64> = split_metrics.iter().filter_map(|m| m.mape).collect();
    let mape = if mape_values.is_empty() {
        None
    } else {
        Some(mape_values.iter().sum::<f64>() / mape_values.len() as f64)
    };

    Some(SeriesSummary {
        key,
        total_splits,
        successful_splits: split_metrics.len(),
        mae,
        rmse,
        mape,
    })
}

/// Batch-level metric summary: the unweighted mean of series summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSummary {
    /// Series contributing to the aggregate.
    pub n_series: usize,
    pub mae: f64,
    pub rmse: f64,
    pub mape: Option<f64>,
}

/// Aggregate series summaries into the global summary.
///
/// The mean is taken over series, never pooled over raw points. Returns
/// `None` when no series has backtest coverage.
pub fn summarize_global(summaries: &[SeriesSummary]) -> Option<GlobalSummary> {
    if summaries.is_empty() {
        return None;
    }

    let n = summaries.len() as f64;
    let mae = summaries.iter().map(|s| s.mae).sum::<f64>() / n;
    let rmse = summaries.iter().map(|s| s.rmse).sum::<f64>() / n;

    let mape_values: Vec<f64> = summaries.iter().filter_map(|s| s.mape).collect();
    let mape = if mape_values.is_empty() {
        None
    } else {
        Some(mape_values.iter().sum::<f64>() / mape_values.len() as f64)
    };

    Some(GlobalSummary {
        n_series: summaries.len(),
        mae,
        rmse,
        mape,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn perfect_forecast_scores_zero() {
        let actual = vec![5.0, 6.0, 7.0];
        let metrics = compute_split_metrics(&actual, &actual).unwrap();

        assert_relative_eq!(metrics.mae, 0.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.rmse, 0.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.mape.unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn known_error_values() {
        let actual = vec![10.0, 10.0, 10.0, 10.0];
        let predicted = vec![11.0, 9.0, 12.0, 8.0];
        // Absolute errors: 1, 1, 2, 2.

        let metrics = compute_split_metrics(&actual, &predicted).unwrap();
        assert_relative_eq!(metrics.mae, 1.5, epsilon = 1e-12);
        assert_relative_eq!(metrics.rmse, (10.0f64 / 4.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(metrics.mape.unwrap(), 15.0, epsilon = 1e-12);
    }

    #[test]
    fn rmse_dominates_mae() {
        let actual = vec![1.0, 2.0, 3.0, 4.0];
        let predicted = vec![1.5, 1.5, 5.0, 4.0];
        let metrics = compute_split_metrics(&actual, &predicted).unwrap();
        assert!(metrics.rmse >= metrics.mae);
    }

    #[test]
    fn zero_actual_disables_mape_only() {
        let actual = vec![0.0, 10.0];
        let predicted = vec![1.0, 11.0];
        let metrics = compute_split_metrics(&actual, &predicted).unwrap();

        assert_relative_eq!(metrics.mae, 1.0, epsilon = 1e-12);
        assert!(metrics.mape.is_none());
    }

    #[test]
    fn missing_actual_excludes_the_point_from_all_metrics() {
        let actual = vec![10.0, f64::NAN, 10.0];
        let predicted = vec![12.0, 100.0, 12.0];
        let metrics = compute_split_metrics(&actual, &predicted).unwrap();

        // The NaN point contributes nothing, not zero.
        assert_relative_eq!(metrics.mae, 2.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.rmse, 2.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.mape.unwrap(), 20.0, epsilon = 1e-12);
    }

    #[test]
    fn all_missing_actuals_is_an_error() {
        let actual = vec![f64::NAN, f64::NAN];
        let predicted = vec![1.0, 2.0];
        assert!(matches!(
            compute_split_metrics(&actual, &predicted),
            Err(PipelineError::EmptyData)
        ));
    }

    #[test]
    fn mismatched_lengths_are_an_error() {
        assert!(matches!(
            compute_split_metrics(&[1.0, 2.0], &[1.0]),
            Err(PipelineError::LengthMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn series_summary_is_mean_over_splits() {
        let key = SeriesKey::new(1, 1);
        let splits = vec![
            SplitMetrics { mae: 1.0, rmse: 2.0, mape: Some(10.0) },
            SplitMetrics { mae: 3.0, rmse: 4.0, mape: None },
        ];

        let summary = summarize_series(key, &splits, 3).unwrap();
        assert_eq!(summary.total_splits, 3);
        assert_eq!(summary.successful_splits, 2);
        assert_relative_eq!(summary.mae, 2.0, epsilon = 1e-12);
        assert_relative_eq!(summary.rmse, 3.0, epsilon = 1e-12);
        // MAPE averaged over the one split that defined it.
        assert_relative_eq!(summary.mape.unwrap(), 10.0, epsilon = 1e-12);
    }

    #[test]
    fn series_with_no_successful_splits_has_no_summary() {
        assert!(summarize_series(SeriesKey::new(1, 1), &[], 4).is_none());
    }

    #[test]
    fn global_summary_weights_series_equally() {
        // Two series with different split counts and different constant
        // errors; the global mean must be the series-level mean, not the
        // pooled split-level mean.
        let long = summarize_series(
            SeriesKey::new(1, 1),
            &vec![SplitMetrics { mae: 1.0, rmse: 1.0, mape: Some(1.0) }; 9],
            9,
        )
        .unwrap();
        let short = summarize_series(
            SeriesKey::new(1, 2),
            &[SplitMetrics { mae: 3.0, rmse: 3.0, mape: Some(3.0) }],
            1,
        )
        .unwrap();

        let global = summarize_global(&[long, short]).unwrap();
        assert_eq!(global.n_series, 2);
        assert_relative_eq!(global.mae, 2.0, epsilon = 1e-12);
        // Pooled over splits the mean would have been (9*1 + 3)/10 = 1.2.
        assert!((global.mae - 1.2).abs() > 0.5);
    }

    #[test]
    fn empty_global_summary_is_none() {
        assert!(summarize_global(&[]).is_none());
    }
}
