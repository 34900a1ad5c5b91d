//! Observability infrastructure for the analytics engine
//!
//! Provides:
//! - Prometheus metrics (samples, anomalies, predictions, storage errors, latency)
//! - Structured JSON logging with tracing

use crate::models::{AnomalyRecord, PredictionRecord, Severity, SummaryReport};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AnalyticsMetricsInner> = OnceLock::new();

struct AnalyticsMetricsInner {
    samples_recorded: IntCounter,
    anomalies_detected: IntCounterVec,
    predictions_generated: IntCounterVec,
    storage_errors: IntCounterVec,
    insufficient_data: IntCounterVec,
    baseline_cache_hits: IntCounter,
    baseline_cache_misses: IntCounter,
    samples_purged: IntCounter,
    detection_latency_seconds: Histogram,
    prediction_latency_seconds: Histogram,
}

impl AnalyticsMetricsInner {
    fn new() -> Self {
        Self {
            samples_recorded: register_int_counter!(
                "service_analytics_samples_recorded_total",
                "Total number of health samples persisted"
            )
            .expect("Failed to register samples_recorded"),

            anomalies_detected: register_int_counter_vec!(
                "service_analytics_anomalies_detected_total",
                "Total number of anomalies detected",
                &["kind", "severity"]
            )
            .expect("Failed to register anomalies_detected"),

            predictions_generated: register_int_counter_vec!(
                "service_analytics_predictions_generated_total",
                "Total number of trend predictions generated",
                &["metric", "classification"]
            )
            .expect("Failed to register predictions_generated"),

            storage_errors: register_int_counter_vec!(
                "service_analytics_storage_errors_total",
                "Total number of metrics store failures",
                &["operation"]
            )
            .expect("Failed to register storage_errors"),

            insufficient_data: register_int_counter_vec!(
                "service_analytics_insufficient_data_total",
                "Operations skipped for lack of history",
                &["operation"]
            )
            .expect("Failed to register insufficient_data"),

            baseline_cache_hits: register_int_counter!(
                "service_analytics_baseline_cache_hits_total",
                "Baseline lookups served from cache"
            )
            .expect("Failed to register baseline_cache_hits"),

            baseline_cache_misses: register_int_counter!(
                "service_analytics_baseline_cache_misses_total",
                "Baseline lookups that queried the store"
            )
            .expect("Failed to register baseline_cache_misses"),

            samples_purged: register_int_counter!(
                "service_analytics_samples_purged_total",
                "Samples removed by retention cleanup"
            )
            .expect("Failed to register samples_purged"),

            detection_latency_seconds: register_histogram!(
                "service_analytics_detection_latency_seconds",
                "Time spent detecting anomalies for one sample",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register detection_latency_seconds"),

            prediction_latency_seconds: register_histogram!(
                "service_analytics_prediction_latency_seconds",
                "Time spent forecasting one service",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),
        }
    }
}

/// Analytics metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AnalyticsMetrics {
    inner: &'static AnalyticsMetricsInner,
}

impl Default for AnalyticsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AnalyticsMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsMetrics").finish_non_exhaustive()
    }
}

impl AnalyticsMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        Self {
            inner: GLOBAL_METRICS.get_or_init(AnalyticsMetricsInner::new),
        }
    }

    pub fn inc_samples_recorded(&self) {
        self.inner.samples_recorded.inc();
    }

    pub fn record_anomaly(&self, anomaly: &AnomalyRecord) {
        self.inner
            .anomalies_detected
            .with_label_values(&[anomaly.kind.as_str(), anomaly.severity.as_str()])
            .inc();
    }

    pub fn record_prediction(&self, prediction: &PredictionRecord) {
        self.inner
            .predictions_generated
            .with_label_values(&[prediction.metric.as_str(), prediction.classification.as_str()])
            .inc();
    }

    pub fn inc_storage_errors(&self, operation: &str) {
        self.inner.storage_errors.with_label_values(&[operation]).inc();
    }

    pub fn inc_insufficient_data(&self, operation: &str) {
        self.inner.insufficient_data.with_label_values(&[operation]).inc();
    }

    pub fn inc_cache_hit(&self) {
        self.inner.baseline_cache_hits.inc();
    }

    pub fn inc_cache_miss(&self) {
        self.inner.baseline_cache_misses.inc();
    }

    pub fn add_samples_purged(&self, count: u64) {
        self.inner.samples_purged.inc_by(count);
    }

    pub fn observe_detection_latency(&self, duration_secs: f64) {
        self.inner.detection_latency_seconds.observe(duration_secs);
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner.prediction_latency_seconds.observe(duration_secs);
    }
}

/// Structured logger for analytics events
///
/// Every event carries an `event` field and the emitting instance name.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log an anomaly detection event
    pub fn log_anomaly(&self, anomaly: &AnomalyRecord) {
        match anomaly.severity {
            Severity::Critical => {
                warn!(
                    event = "anomaly_detected",
                    instance = %self.instance,
                    service = %anomaly.service_name,
                    anomaly_type = %anomaly.kind,
                    severity = %anomaly.severity,
                    confidence = anomaly.confidence,
                    details = %anomaly.description,
                    "Critical anomaly detected"
                );
            }
            Severity::Warning => {
                info!(
                    event = "anomaly_detected",
                    instance = %self.instance,
                    service = %anomaly.service_name,
                    anomaly_type = %anomaly.kind,
                    severity = %anomaly.severity,
                    confidence = anomaly.confidence,
                    details = %anomaly.description,
                    "Anomaly detected"
                );
            }
        }
    }

    /// Log a prediction generation event
    pub fn log_prediction(&self, prediction: &PredictionRecord) {
        info!(
            event = "prediction_generated",
            instance = %self.instance,
            service = %prediction.service_name,
            metric = %prediction.metric,
            classification = %prediction.classification,
            predicted_value = prediction.predicted_value,
            trend_slope = prediction.trend_slope,
            confidence = prediction.confidence,
            horizon_hours = prediction.horizon_hours,
            "Generated trend prediction"
        );
    }

    /// Log an operation skipped for lack of history
    pub fn log_insufficient_data(
        &self,
        operation: &str,
        service: &str,
        needed: usize,
        available: usize,
    ) {
        debug!(
            event = "insufficient_data",
            instance = %self.instance,
            operation = %operation,
            service = %service,
            needed = needed,
            available = available,
            "Not enough history, skipping"
        );
    }

    /// Log a metrics store failure swallowed by a fail-open operation
    pub fn log_storage_failure(&self, operation: &str, service: Option<&str>, error: &dyn std::fmt::Display) {
        error!(
            event = "storage_failure",
            instance = %self.instance,
            operation = %operation,
            service = service.unwrap_or("-"),
            error = %error,
            "Metrics store operation failed"
        );
    }

    /// Log retention cleanup
    pub fn log_cleanup(&self, retention_days: u32, purged: usize) {
        info!(
            event = "retention_cleanup",
            instance = %self.instance,
            retention_days = retention_days,
            purged_samples = purged,
            "Purged samples older than retention window"
        );
    }

    /// Log a generated summary report
    pub fn log_summary(&self, report: &SummaryReport) {
        if report.is_empty() {
            debug!(
                event = "summary_generated",
                instance = %self.instance,
                window_hours = report.window_hours,
                "Summary generated over an empty store"
            );
            return;
        }
        debug!(
            event = "summary_generated",
            instance = %self.instance,
            window_hours = report.window_hours,
            anomalies = report.total_anomalies(),
            predictions = report.total_predictions(),
            services = report.service_health.len(),
            "Summary generated"
        );
    }

    /// Log engine startup
    pub fn log_startup(&self, version: &str, enabled: bool, store: &str) {
        info!(
            event = "analytics_started",
            instance = %self.instance,
            version = %version,
            enabled = enabled,
            store = %store,
            "Service health analytics started"
        );
    }

    /// Log engine shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "analytics_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Service health analytics shutting down"
        );
    }
}
