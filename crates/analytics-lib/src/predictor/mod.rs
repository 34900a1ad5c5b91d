//! Trend prediction engine

mod forecaster;
mod regression;

pub use forecaster::{TrendForecaster, MIN_HISTORY, MIN_POINTS};
pub use regression::{linear_fit, LinearFit};
