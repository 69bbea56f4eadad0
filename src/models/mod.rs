//! Forecasting model adapters.
//!
//! The pipeline is agnostic to the concrete algorithm: anything implementing
//! [`Forecaster`] can be plugged in through a [`ModelFactory`]. The models in
//! this module are the shipped reference implementations.

mod drift;
mod naive;
mod seasonal_naive;
mod traits;

pub use drift::Drift;
pub use naive::Naive;
pub use seasonal_naive::SeasonalNaive;
pub use traits::{BoxedForecaster, Forecaster, ModelFactory};
