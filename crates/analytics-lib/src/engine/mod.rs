//! Analytics engine
//!
//! Owns the metrics store, the baseline cache, the detectors and the
//! forecaster. Public operations are fail-open: storage failures and missing
//! history are logged and reported as empty results, never as errors.

#[cfg(test)]
mod tests;

use crate::anomaly::AnomalyDetector;
use crate::baseline::{BaselineCache, BaselineCalculator};
use crate::config::AnalyticsConfig;
use crate::error::{Outcome, StoreError};
use crate::health::{components, HealthRegistry};
use crate::models::{AnomalyRecord, Baseline, MetricSample, PredictionRecord, SummaryReport};
use crate::observability::{AnalyticsMetrics, StructuredLogger};
use crate::predictor::{TrendForecaster, MIN_HISTORY};
use crate::store::{window_start, MetricsStore, MAX_QUERY_ROWS};
use chrono::{Duration, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, warn};

/// Window covered by [`AnalyticsEngine::get_summary`]
pub const SUMMARY_WINDOW_HOURS: u32 = 24;

mod operation {
    pub const RECORD: &str = "record_sample";
    pub const DETECT: &str = "detect_anomalies";
    pub const PREDICT: &str = "generate_predictions";
    pub const SUMMARY: &str = "get_summary";
    pub const CLEANUP: &str = "cleanup_old_data";
}

/// Service health analytics over a shared metrics store
pub struct AnalyticsEngine {
    store: Arc<dyn MetricsStore>,
    config: AnalyticsConfig,
    baselines: BaselineCalculator,
    detector: AnomalyDetector,
    forecaster: TrendForecaster,
    /// Serializes every write to the store
    write_lock: Mutex<()>,
    metrics: AnalyticsMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl AnalyticsEngine {
    pub fn new(store: Arc<dyn MetricsStore>, config: AnalyticsConfig) -> Self {
        let config = config.sanitized();
        let cache = BaselineCache::new(
            Duration::seconds(config.baseline_ttl_secs.min(u32::MAX as u64) as i64),
            config.baseline_refresh_samples,
        );

        Self {
            baselines: BaselineCalculator::new(
                config.learning_window_days,
                config.min_samples,
                cache,
            ),
            detector: AnomalyDetector::new(config.anomaly_threshold),
            forecaster: TrendForecaster::new(),
            write_lock: Mutex::new(()),
            metrics: AnalyticsMetrics::new(),
            logger: StructuredLogger::new("analytics"),
            health: None,
            store,
            config,
        }
    }

    /// Report store and engine health into `registry`
    pub fn with_health(mut self, registry: HealthRegistry) -> Self {
        registry.register(components::METRICS_STORE);
        registry.register(components::ENGINE);
        if !self.config.enabled {
            registry.set_degraded(components::ENGINE, "analytics disabled by configuration");
        }
        self.health = Some(registry);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// Persist one health sample
    ///
    /// Returns whether the sample was stored. Samples are recorded even when
    /// analytics is disabled.
    pub fn record_sample(&self, sample: &MetricSample) -> bool {
        let result = {
            let _guard = self.write_guard();
            self.store.insert_sample(sample)
        };

        match result {
            Ok(()) => {
                self.baselines.cache().note_sample(&sample.service_name);
                self.metrics.inc_samples_recorded();
                self.store_ok();
                debug!(
                    event = "sample_recorded",
                    service = %sample.service_name,
                    status = %sample.status,
                    "Recorded health sample"
                );
                true
            }
            Err(e) => {
                self.storage_failure(operation::RECORD, Some(&sample.service_name), &e);
                false
            }
        }
    }

    /// Detect anomalies in `sample` against its service baseline
    ///
    /// Detected anomalies are persisted and returned. Returns an empty list
    /// when the baseline cannot be established.
    pub fn detect_anomalies(&self, sample: &MetricSample) -> Vec<AnomalyRecord> {
        if !self.config.enabled {
            return Vec::new();
        }

        let started = Instant::now();
        let outcome = self.try_detect(sample);
        self.metrics
            .observe_detection_latency(started.elapsed().as_secs_f64());

        let anomalies = self.settle(operation::DETECT, &sample.service_name, outcome);
        for anomaly in &anomalies {
            self.metrics.record_anomaly(anomaly);
            self.logger.log_anomaly(anomaly);
        }
        self.persist(operation::DETECT, &anomalies, |store, a| store.insert_anomaly(a));
        anomalies
    }

    /// Forecast availability and performance of a service
    ///
    /// A zero `horizon_hours` falls back to the configured default.
    pub fn generate_predictions(
        &self,
        service_name: &str,
        horizon_hours: u32,
    ) -> Vec<PredictionRecord> {
        if !self.config.enabled {
            return Vec::new();
        }
        let horizon_hours = self.config.horizon_or_default(horizon_hours);

        let started = Instant::now();
        let outcome = self.try_predict(service_name, horizon_hours);
        self.metrics
            .observe_prediction_latency(started.elapsed().as_secs_f64());

        let predictions = self.settle(operation::PREDICT, service_name, outcome);
        for prediction in &predictions {
            self.metrics.record_prediction(prediction);
            self.logger.log_prediction(prediction);
        }
        self.persist(operation::PREDICT, &predictions, |store, p| {
            store.insert_prediction(p)
        });
        predictions
    }

    /// Summary of the trailing 24 hours
    pub fn get_summary(&self) -> SummaryReport {
        self.summary_for_window(SUMMARY_WINDOW_HOURS)
    }

    /// Summary of the trailing `window_hours`; an empty report on failure
    pub fn summary_for_window(&self, window_hours: u32) -> SummaryReport {
        let now = Utc::now();
        let since = window_start(now, Duration::hours(window_hours as i64));

        match self.store.aggregate_summary(since) {
            Ok(aggregate) => {
                self.store_ok();
                let report = SummaryReport::from_aggregate(aggregate, window_hours, now);
                self.logger.log_summary(&report);
                report
            }
            Err(e) => {
                self.storage_failure(operation::SUMMARY, None, &e);
                SummaryReport::empty(window_hours, now)
            }
        }
    }

    /// Delete data older than `days_to_keep` days
    ///
    /// Returns the number of samples removed, or 0 on failure. Zero days
    /// falls back to the configured retention.
    pub fn cleanup_old_data(&self, days_to_keep: u32) -> usize {
        let days = if days_to_keep == 0 {
            warn!(
                event = "config_coerced",
                key = "days_to_keep",
                fallback = self.config.retention_days,
                "Zero retention requested, using configured retention"
            );
            self.config.retention_days
        } else {
            days_to_keep
        };
        let cutoff = window_start(Utc::now(), Duration::days(days as i64));

        let result = {
            let _guard = self.write_guard();
            self.store.purge_before(cutoff)
        };

        match result {
            Ok(purged) => {
                // Baselines may cover purged rows
                self.baselines.cache().clear();
                self.metrics.add_samples_purged(purged as u64);
                self.logger.log_cleanup(days, purged);
                self.store_ok();
                purged
            }
            Err(e) => {
                self.storage_failure(operation::CLEANUP, None, &e);
                0
            }
        }
    }

    /// Cached baseline of a service, if one is fresh enough to be held
    pub fn cached_baseline(&self, service_name: &str) -> Option<Baseline> {
        self.baselines.cache().get(service_name)
    }

    /// Drop the cached baseline of a service
    pub fn invalidate_baseline(&self, service_name: &str) -> bool {
        self.baselines.cache().invalidate(service_name)
    }

    /// Drop every cached baseline
    pub fn clear_baselines(&self) {
        self.baselines.cache().clear();
    }

    fn try_detect(&self, sample: &MetricSample) -> Outcome<Vec<AnomalyRecord>> {
        let now = Utc::now();
        let mut missed = false;
        let baseline = self
            .baselines
            .resolve(self.store.as_ref(), &sample.service_name, now, || missed = true);
        if missed {
            self.metrics.inc_cache_miss();
        } else if baseline.is_ready() {
            self.metrics.inc_cache_hit();
        }

        let baseline = match baseline {
            Outcome::Ready(baseline) => baseline,
            Outcome::InsufficientData { needed, available } => {
                return Outcome::InsufficientData { needed, available }
            }
            Outcome::Failed(e) => return Outcome::Failed(e),
        };

        // Z-score checks still run when the status history is unreadable
        let flapping = &self.detector.flapping;
        let statuses = match self.store.query_recent_statuses(
            &sample.service_name,
            window_start(now, flapping.window),
            flapping.max_observations,
        ) {
            Ok(statuses) => {
                self.store_ok();
                statuses
            }
            Err(e) => {
                self.storage_failure(operation::DETECT, Some(&sample.service_name), &e);
                Vec::new()
            }
        };

        Outcome::Ready(self.detector.detect(sample, &baseline, &statuses))
    }

    fn try_predict(&self, service_name: &str, horizon_hours: u32) -> Outcome<Vec<PredictionRecord>> {
        let now = Utc::now();
        let since = window_start(now, self.baselines.learning_window);

        let mut history = match self.store.query_recent(service_name, since, MAX_QUERY_ROWS) {
            Ok(points) => {
                self.store_ok();
                points
            }
            Err(e) => return e.into(),
        };
        if history.len() < MIN_HISTORY {
            return Outcome::InsufficientData {
                needed: MIN_HISTORY,
                available: history.len(),
            };
        }
        // Oldest first for the regression axis
        history.reverse();

        Outcome::Ready(
            self.forecaster
                .predict(service_name, &history, horizon_hours, now),
        )
    }

    /// Collapse an outcome into a possibly empty result
    fn settle<T>(&self, operation: &str, service_name: &str, outcome: Outcome<Vec<T>>) -> Vec<T> {
        match outcome {
            Outcome::Ready(records) => records,
            Outcome::InsufficientData { needed, available } => {
                self.metrics.inc_insufficient_data(operation);
                self.logger
                    .log_insufficient_data(operation, service_name, needed, available);
                Vec::new()
            }
            Outcome::Failed(e) => {
                self.metrics.inc_storage_errors(operation);
                self.logger
                    .log_storage_failure(operation, Some(service_name), &e);
                self.store_degraded(&e);
                Vec::new()
            }
        }
    }

    /// Persist derived records one by one, logging each failure
    fn persist<T>(
        &self,
        operation: &str,
        records: &[T],
        insert: impl Fn(&dyn MetricsStore, &T) -> Result<(), StoreError>,
    ) {
        if records.is_empty() {
            return;
        }
        let _guard = self.write_guard();
        for record in records {
            if let Err(e) = insert(self.store.as_ref(), record) {
                self.storage_failure(operation, None, &e);
            }
        }
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn storage_failure(&self, operation: &str, service_name: Option<&str>, error: &StoreError) {
        self.metrics.inc_storage_errors(operation);
        self.logger.log_storage_failure(operation, service_name, error);
        self.store_degraded(error);
    }

    fn store_degraded(&self, error: &dyn std::fmt::Display) {
        if let Some(health) = &self.health {
            health.set_degraded(components::METRICS_STORE, error.to_string());
        }
    }

    fn store_ok(&self) {
        if let Some(health) = &self.health {
            health.recover(components::METRICS_STORE);
        }
    }
}

impl std::fmt::Debug for AnalyticsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsEngine")
            .field("config", &self.config)
            .field("cached_baselines", &self.baselines.cache().len())
            .finish_non_exhaustive()
    }
}
