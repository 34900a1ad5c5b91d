//! Linear trend forecasting over a service's history

use super::regression::linear_fit;
use crate::baseline::sample_std;
use crate::models::{ForecastMetric, MetricPoint, PredictionRecord, TrendDirection};
use chrono::{DateTime, Utc};
use tracing::debug;

/// History rows required before any forecast is attempted
pub const MIN_HISTORY: usize = 20;

/// Non-null points required per dimension
pub const MIN_POINTS: usize = 10;

/// Trailing points used to judge volatility
const VOLATILITY_WINDOW: usize = 10;

/// Floor for forecast confidence
const MIN_CONFIDENCE: f64 = 20.0;

/// Per-dimension forecasting parameters
#[derive(Debug, Clone, Copy)]
struct DimensionRule {
    metric: ForecastMetric,
    /// Slope magnitude separating stable from trending
    slope_threshold: f64,
    /// Confidence lost per unit of recent standard deviation
    volatility_penalty: f64,
}

const AVAILABILITY_RULE: DimensionRule = DimensionRule {
    metric: ForecastMetric::Availability,
    slope_threshold: 0.1,
    volatility_penalty: 10.0,
};

const PERFORMANCE_RULE: DimensionRule = DimensionRule {
    metric: ForecastMetric::Performance,
    slope_threshold: 0.05,
    volatility_penalty: 5.0,
};

/// Fits a straight line per dimension and extrapolates it
#[derive(Debug, Clone, Default)]
pub struct TrendForecaster;

impl TrendForecaster {
    pub fn new() -> Self {
        Self
    }

    /// Forecast availability and performance for a service
    ///
    /// `history` must be ordered oldest first. Rows with a null value keep
    /// their position on the x axis but contribute no point.
    pub fn predict(
        &self,
        service_name: &str,
        history: &[MetricPoint],
        horizon_hours: u32,
        now: DateTime<Utc>,
    ) -> Vec<PredictionRecord> {
        if history.len() < MIN_HISTORY {
            debug!(
                service = %service_name,
                rows = history.len(),
                needed = MIN_HISTORY,
                "Not enough history to forecast"
            );
            return Vec::new();
        }

        let availability: Vec<(f64, f64)> = indexed(history, |p| p.availability);
        let performance: Vec<(f64, f64)> = indexed(history, |p| p.performance);

        [(AVAILABILITY_RULE, availability), (PERFORMANCE_RULE, performance)]
            .into_iter()
            .filter_map(|(rule, points)| {
                Self::forecast(service_name, rule, &points, horizon_hours, now)
            })
            .collect()
    }

    fn forecast(
        service_name: &str,
        rule: DimensionRule,
        points: &[(f64, f64)],
        horizon_hours: u32,
        now: DateTime<Utc>,
    ) -> Option<PredictionRecord> {
        if points.len() < MIN_POINTS {
            return None;
        }
        let fit = linear_fit(points)?;

        let n = points.len() as f64;
        let future_x = n + horizon_hours as f64 / 24.0 * 7.0;
        let predicted_value = fit.at(future_x);

        let recent: Vec<f64> = points
            .iter()
            .skip(points.len().saturating_sub(VOLATILITY_WINDOW))
            .map(|(_, y)| *y)
            .collect();
        let confidence = (100.0 - sample_std(&recent) * rule.volatility_penalty).max(MIN_CONFIDENCE);

        let classification = if fit.slope < -rule.slope_threshold {
            TrendDirection::Declining
        } else if fit.slope > rule.slope_threshold {
            TrendDirection::Improving
        } else {
            TrendDirection::Stable
        };

        Some(PredictionRecord {
            timestamp: now,
            service_name: service_name.to_string(),
            metric: rule.metric,
            predicted_value,
            trend_slope: fit.slope,
            confidence,
            horizon_hours,
            classification,
            description: describe(rule.metric, classification, predicted_value, horizon_hours),
        })
    }
}

fn indexed(history: &[MetricPoint], value: impl Fn(&MetricPoint) -> Option<f64>) -> Vec<(f64, f64)> {
    history
        .iter()
        .enumerate()
        .filter_map(|(i, p)| value(p).map(|y| (i as f64, y)))
        .collect()
}

fn describe(
    metric: ForecastMetric,
    classification: TrendDirection,
    predicted: f64,
    horizon_hours: u32,
) -> String {
    match (metric, classification) {
        (ForecastMetric::Availability, TrendDirection::Stable) => {
            format!("Availability stable. Predicted: {predicted:.1}% in {horizon_hours}h")
        }
        (ForecastMetric::Availability, trend) => format!(
            "Availability trend {}. Predicted: {predicted:.1}% in {horizon_hours}h",
            trend.as_str()
        ),
        (ForecastMetric::Performance, trend) => format!(
            "Performance {}. Predicted score: {predicted:.1} in {horizon_hours}h",
            trend.as_str()
        ),
    }
}
