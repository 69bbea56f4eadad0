//! Core data structures: series identity, observations, and forecasts.

mod forecast;
mod series;

pub use forecast::{Forecast, ForecastBands, ForecastPoint};
pub use series::{Observation, Series, SeriesKey};
