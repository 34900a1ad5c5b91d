//! Core data models for the analytics engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One health check result for one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub service_name: String,
    pub status: String,
    /// Availability score, 0-100
    pub availability_score: f64,
    pub performance_score: f64,
    /// Response time in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
}

impl MetricSample {
    pub fn new(
        service_name: impl Into<String>,
        status: impl Into<String>,
        availability_score: f64,
        performance_score: f64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            service_name: service_name.into(),
            status: status.into(),
            availability_score,
            performance_score,
            response_time: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_response_time(mut self, seconds: f64) -> Self {
        self.response_time = Some(seconds);
        self
    }
}

/// Stored metric values for a single sample, as returned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub availability: Option<f64>,
    pub performance: Option<f64>,
    pub response_time: Option<f64>,
}

impl From<&MetricSample> for MetricPoint {
    fn from(sample: &MetricSample) -> Self {
        Self {
            timestamp: sample.timestamp,
            availability: Some(sample.availability_score),
            performance: Some(sample.performance_score),
            response_time: sample.response_time,
        }
    }
}

/// Status code observed at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusObservation {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Statistical baseline of a service over its learning window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub service_name: String,
    pub availability_mean: f64,
    pub availability_std: f64,
    pub performance_mean: f64,
    pub performance_std: f64,
    pub response_time_mean: f64,
    pub response_time_std: f64,
    pub sample_count: usize,
}

/// Classes of anomalies the detector can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    AvailabilityDrop,
    PerformanceDegradation,
    UnusualBehavior,
    ServiceFlapping,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::AvailabilityDrop => "availability_drop",
            AnomalyKind::PerformanceDegradation => "performance_degradation",
            AnomalyKind::UnusualBehavior => "unusual_behavior",
            AnomalyKind::ServiceFlapping => "service_flapping",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "availability_drop" => Some(AnomalyKind::AvailabilityDrop),
            "performance_degradation" => Some(AnomalyKind::PerformanceDegradation),
            "unusual_behavior" => Some(AnomalyKind::UnusualBehavior),
            "service_flapping" => Some(AnomalyKind::ServiceFlapping),
            _ => None,
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of an anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "warning" => Some(Severity::Warning),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected deviation from a service's baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub timestamp: DateTime<Utc>,
    pub service_name: String,
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
    /// Confidence score, 0-100
    pub confidence: f64,
    /// Metric name to observed value, including the raw z-score where relevant
    pub affected_metrics: BTreeMap<String, f64>,
}

/// Dimension a forecast is made for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastMetric {
    Availability,
    Performance,
}

impl ForecastMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastMetric::Availability => "availability",
            ForecastMetric::Performance => "performance",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "availability" => Some(ForecastMetric::Availability),
            "performance" => Some(ForecastMetric::Performance),
            _ => None,
        }
    }
}

impl fmt::Display for ForecastMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a fitted trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Declining,
    Improving,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Declining => "declining",
            TrendDirection::Improving => "improving",
            TrendDirection::Stable => "stable",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "declining" => Some(TrendDirection::Declining),
            "improving" => Some(TrendDirection::Improving),
            "stable" => Some(TrendDirection::Stable),
            _ => None,
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linear forecast for one metric of one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub timestamp: DateTime<Utc>,
    pub service_name: String,
    pub metric: ForecastMetric,
    pub predicted_value: f64,
    pub trend_slope: f64,
    /// Confidence score, 20-100
    pub confidence: f64,
    pub horizon_hours: u32,
    pub classification: TrendDirection,
    pub description: String,
}

/// Average health of one service over the summary window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealthSummary {
    pub service_name: String,
    pub avg_availability: Option<f64>,
    pub avg_performance: Option<f64>,
}

/// Data quality figures over the whole store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub total_samples: u64,
    pub distinct_services: u64,
    pub oldest_sample: Option<DateTime<Utc>>,
    pub newest_sample: Option<DateTime<Utc>>,
}

/// Aggregates computed by the metrics store for a summary window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryAggregate {
    pub anomaly_counts: BTreeMap<Severity, u64>,
    /// Ordered by average availability, highest first
    pub service_health: Vec<ServiceHealthSummary>,
    pub prediction_counts: BTreeMap<TrendDirection, u64>,
    pub data_quality: DataQuality,
}

/// Read-only analytics summary handed to reporting callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub window_hours: u32,
    pub anomaly_counts: BTreeMap<Severity, u64>,
    pub service_health: Vec<ServiceHealthSummary>,
    pub prediction_counts: BTreeMap<TrendDirection, u64>,
    pub data_quality: DataQuality,
    pub generated_at: DateTime<Utc>,
}

impl SummaryReport {
    pub fn from_aggregate(
        aggregate: SummaryAggregate,
        window_hours: u32,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            window_hours,
            anomaly_counts: aggregate.anomaly_counts,
            service_health: aggregate.service_health,
            prediction_counts: aggregate.prediction_counts,
            data_quality: aggregate.data_quality,
            generated_at,
        }
    }

    /// Summary with no data, returned when the store cannot be read
    pub fn empty(window_hours: u32, generated_at: DateTime<Utc>) -> Self {
        Self::from_aggregate(SummaryAggregate::default(), window_hours, generated_at)
    }

    pub fn total_anomalies(&self) -> u64 {
        self.anomaly_counts.values().sum()
    }

    pub fn total_predictions(&self) -> u64 {
        self.prediction_counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.data_quality.total_samples == 0
            && self.anomaly_counts.is_empty()
            && self.prediction_counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_string_round_trip() {
        for kind in [
            AnomalyKind::AvailabilityDrop,
            AnomalyKind::PerformanceDegradation,
            AnomalyKind::UnusualBehavior,
            AnomalyKind::ServiceFlapping,
        ] {
            assert_eq!(AnomalyKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(Severity::parse("critical"), Some(Severity::Critical));
        assert_eq!(TrendDirection::parse("bogus"), None);
    }

    #[test]
    fn test_summary_serializes_enum_keys() {
        let mut aggregate = SummaryAggregate::default();
        aggregate.anomaly_counts.insert(Severity::Critical, 2);
        aggregate.prediction_counts.insert(TrendDirection::Stable, 1);
        let report = SummaryReport::from_aggregate(aggregate, 24, Utc::now());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["anomaly_counts"]["critical"], 2);
        assert_eq!(json["prediction_counts"]["stable"], 1);
        assert_eq!(report.total_anomalies(), 2);
    }

    #[test]
    fn test_sample_builder() {
        let sample = MetricSample::new("api", "operational", 99.5, 88.0).with_response_time(0.4);
        assert_eq!(sample.response_time, Some(0.4));
        let point = MetricPoint::from(&sample);
        assert_eq!(point.availability, Some(99.5));
        assert_eq!(point.performance, Some(88.0));
    }
}
