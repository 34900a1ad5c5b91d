//! Engine tests against in-memory and failing stores

use super::*;
use crate::health::ComponentStatus;
use crate::models::{
    AnomalyKind, ForecastMetric, MetricPoint, Severity, StatusObservation, SummaryAggregate,
    TrendDirection,
};
use crate::store::InMemoryStore;
use chrono::DateTime;

/// Store whose every operation fails
struct FailingStore;

impl MetricsStore for FailingStore {
    fn insert_sample(&self, _: &MetricSample) -> Result<(), StoreError> {
        Err(StoreError::LockPoisoned)
    }

    fn query_recent(
        &self,
        _: &str,
        _: DateTime<Utc>,
        _: usize,
    ) -> Result<Vec<MetricPoint>, StoreError> {
        Err(StoreError::LockPoisoned)
    }

    fn query_recent_statuses(
        &self,
        _: &str,
        _: DateTime<Utc>,
        _: usize,
    ) -> Result<Vec<StatusObservation>, StoreError> {
        Err(StoreError::LockPoisoned)
    }

    fn insert_anomaly(&self, _: &AnomalyRecord) -> Result<(), StoreError> {
        Err(StoreError::LockPoisoned)
    }

    fn insert_prediction(&self, _: &PredictionRecord) -> Result<(), StoreError> {
        Err(StoreError::LockPoisoned)
    }

    fn aggregate_summary(&self, _: DateTime<Utc>) -> Result<SummaryAggregate, StoreError> {
        Err(StoreError::CorruptRow {
            table: "service_metrics",
            reason: "unreadable".to_string(),
        })
    }

    fn purge_before(&self, _: DateTime<Utc>) -> Result<usize, StoreError> {
        Err(StoreError::LockPoisoned)
    }
}

/// In-memory store whose status history cannot be read
struct StatusBlindStore(InMemoryStore);

impl MetricsStore for StatusBlindStore {
    fn insert_sample(&self, sample: &MetricSample) -> Result<(), StoreError> {
        self.0.insert_sample(sample)
    }

    fn query_recent(
        &self,
        service_name: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MetricPoint>, StoreError> {
        self.0.query_recent(service_name, since, limit)
    }

    fn query_recent_statuses(
        &self,
        _: &str,
        _: DateTime<Utc>,
        _: usize,
    ) -> Result<Vec<StatusObservation>, StoreError> {
        Err(StoreError::LockPoisoned)
    }

    fn insert_anomaly(&self, record: &AnomalyRecord) -> Result<(), StoreError> {
        self.0.insert_anomaly(record)
    }

    fn insert_prediction(&self, record: &PredictionRecord) -> Result<(), StoreError> {
        self.0.insert_prediction(record)
    }

    fn aggregate_summary(&self, since: DateTime<Utc>) -> Result<SummaryAggregate, StoreError> {
        self.0.aggregate_summary(since)
    }

    fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.0.purge_before(cutoff)
    }
}

fn engine_with(store: Arc<InMemoryStore>) -> AnalyticsEngine {
    AnalyticsEngine::new(store, AnalyticsConfig::default())
}

/// Record `count` samples, newest at `now`, alternating around the given means
fn seed(
    engine: &AnalyticsEngine,
    service: &str,
    count: usize,
    availability: f64,
    performance: f64,
) {
    let now = Utc::now();
    for i in 0..count {
        let jitter = if i % 2 == 0 { -0.5 } else { 0.5 };
        let sample = MetricSample::new(
            service,
            "operational",
            availability + jitter,
            performance + jitter * 2.0,
        )
        .at(now - Duration::minutes(i as i64));
        assert!(engine.record_sample(&sample));
    }
}

#[test]
fn test_insufficient_history_returns_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_with(store.clone());
    seed(&engine, "api", 10, 99.0, 80.0);

    let anomalies = engine.detect_anomalies(&MetricSample::new("api", "operational", 10.0, 10.0));
    assert!(anomalies.is_empty());
    assert!(store.anomalies().is_empty());
    assert!(engine.cached_baseline("api").is_none());
}

#[test]
fn test_availability_drop_end_to_end() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_with(store.clone());
    seed(&engine, "api", 30, 99.0, 80.0);

    let anomalies = engine.detect_anomalies(&MetricSample::new("api", "operational", 95.0, 80.0));

    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].kind, AnomalyKind::AvailabilityDrop);
    assert_eq!(anomalies[0].severity, Severity::Critical);
    assert_eq!(anomalies[0].confidence, 100.0);
    assert_eq!(store.anomalies(), anomalies);
    assert!(engine.cached_baseline("api").is_some());
}

#[test]
fn test_detection_is_repeatable() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_with(store.clone());
    seed(&engine, "api", 30, 99.0, 80.0);
    let sample = MetricSample::new("api", "operational", 90.0, 60.0);

    let first = engine.detect_anomalies(&sample);
    let second = engine.detect_anomalies(&sample);
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    // Every detected anomaly is persisted, without deduplication
    assert_eq!(store.anomalies().len(), 4);
}

#[test]
fn test_flapping_end_to_end() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_with(store.clone());
    seed(&engine, "api", 30, 99.0, 80.0);

    let now = Utc::now();
    for status in ["degraded", "major_outage"] {
        engine.record_sample(&MetricSample::new("api", status, 99.0, 80.0).at(now));
    }

    let anomalies = engine.detect_anomalies(&MetricSample::new("api", "degraded", 99.0, 80.0));
    assert!(anomalies
        .iter()
        .any(|a| a.kind == AnomalyKind::ServiceFlapping && a.severity == Severity::Warning));
}

#[test]
fn test_predictions_stable_history() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_with(store.clone());
    let now = Utc::now();
    for i in 0..25 {
        engine.record_sample(
            &MetricSample::new("api", "operational", 99.0, 80.0).at(now - Duration::minutes(i)),
        );
    }

    let predictions = engine.generate_predictions("api", 0);

    assert_eq!(predictions.len(), 2);
    for prediction in &predictions {
        assert_eq!(prediction.classification, TrendDirection::Stable);
        assert_eq!(prediction.confidence, 100.0);
        assert_eq!(prediction.horizon_hours, 24);
    }
    assert_eq!(store.predictions().len(), 2);
}

#[test]
fn test_predictions_follow_chronological_order() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_with(store.clone());
    let now = Utc::now();
    // Oldest sample has the highest availability
    for i in 0..25 {
        let sample = MetricSample::new("api", "operational", 100.0 - 0.5 * i as f64, 80.0)
            .at(now - Duration::minutes(25 - i));
        engine.record_sample(&sample);
    }

    let predictions = engine.generate_predictions("api", 24);
    let availability = predictions
        .iter()
        .find(|p| p.metric == ForecastMetric::Availability)
        .unwrap();

    assert_eq!(availability.classification, TrendDirection::Declining);
    assert!((availability.predicted_value - 84.0).abs() < 1e-9);
}

#[test]
fn test_predictions_need_twenty_rows() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_with(store.clone());
    seed(&engine, "api", 19, 99.0, 80.0);

    assert!(engine.generate_predictions("api", 24).is_empty());
    assert!(store.predictions().is_empty());
}

#[test]
fn test_summary_reflects_window() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_with(store.clone());
    seed(&engine, "api", 30, 99.0, 80.0);
    seed(&engine, "web", 30, 90.0, 70.0);
    engine.detect_anomalies(&MetricSample::new("api", "operational", 95.0, 80.0));

    let report = engine.get_summary();

    assert_eq!(report.window_hours, 24);
    assert_eq!(report.anomaly_counts.get(&Severity::Critical), Some(&1));
    assert_eq!(report.data_quality.total_samples, 60);
    assert_eq!(report.data_quality.distinct_services, 2);
    let names: Vec<&str> = report
        .service_health
        .iter()
        .map(|s| s.service_name.as_str())
        .collect();
    assert_eq!(names, vec!["api", "web"]);
}

#[test]
fn test_cleanup_removes_old_data() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_with(store.clone());
    let now = Utc::now();
    for i in 0..5 {
        engine.record_sample(
            &MetricSample::new("api", "operational", 99.0, 80.0).at(now - Duration::days(100 + i)),
        );
    }
    seed(&engine, "api", 30, 99.0, 80.0);
    engine.detect_anomalies(&MetricSample::new("api", "operational", 99.0, 80.0));
    assert!(engine.cached_baseline("api").is_some());

    assert_eq!(engine.cleanup_old_data(90), 5);
    assert_eq!(store.sample_count(), 30);
    assert!(engine.cached_baseline("api").is_none());
    assert_eq!(engine.cleanup_old_data(90), 0);
}

#[test]
fn test_failing_store_fails_open() {
    let registry = HealthRegistry::new();
    let engine = AnalyticsEngine::new(Arc::new(FailingStore), AnalyticsConfig::default())
        .with_health(registry.clone());
    let sample = MetricSample::new("api", "operational", 10.0, 10.0);

    assert!(!engine.record_sample(&sample));
    assert!(engine.detect_anomalies(&sample).is_empty());
    assert!(engine.generate_predictions("api", 24).is_empty());
    assert_eq!(engine.cleanup_old_data(30), 0);

    let report = engine.get_summary();
    assert!(report.is_empty());
    assert_eq!(report.window_hours, 24);

    let health = registry.health();
    assert_eq!(
        health.components[components::METRICS_STORE].status,
        ComponentStatus::Degraded
    );
}

#[test]
fn test_store_recovery_clears_degraded_state() {
    let registry = HealthRegistry::new();
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_with(store).with_health(registry.clone());

    registry.set_degraded(components::METRICS_STORE, "transient");
    engine.record_sample(&MetricSample::new("api", "operational", 99.0, 80.0));

    assert_eq!(registry.health().status, ComponentStatus::Healthy);
}

#[test]
fn test_disabled_engine_still_records() {
    let store = Arc::new(InMemoryStore::new());
    let config = AnalyticsConfig {
        enabled: false,
        ..AnalyticsConfig::default()
    };
    let engine = AnalyticsEngine::new(store.clone(), config);
    seed(&engine, "api", 30, 99.0, 80.0);

    assert!(engine
        .detect_anomalies(&MetricSample::new("api", "operational", 10.0, 10.0))
        .is_empty());
    assert!(engine.generate_predictions("api", 24).is_empty());
    assert_eq!(store.sample_count(), 30);
}

#[test]
fn test_baseline_invalidation() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_with(store);
    seed(&engine, "api", 30, 99.0, 80.0);
    engine.detect_anomalies(&MetricSample::new("api", "operational", 99.0, 80.0));

    assert!(engine.invalidate_baseline("api"));
    assert!(!engine.invalidate_baseline("api"));

    engine.detect_anomalies(&MetricSample::new("api", "operational", 99.0, 80.0));
    engine.clear_baselines();
    assert!(engine.cached_baseline("api").is_none());
}

#[test]
fn test_concurrent_callers() {
    let store = Arc::new(InMemoryStore::new());
    let engine = Arc::new(engine_with(store.clone()));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let service = format!("svc-{}", t % 2);
                seed(&engine, &service, 30, 99.0, 80.0);
                engine.detect_anomalies(&MetricSample::new(&service, "operational", 95.0, 80.0))
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.sample_count(), 240);
    assert!(engine.cached_baseline("svc-0").is_some());
    assert!(engine.cached_baseline("svc-1").is_some());
}

#[test]
fn test_status_history_failure_keeps_zscore_anomalies() {
    let registry = HealthRegistry::new();
    let engine = AnalyticsEngine::new(
        Arc::new(StatusBlindStore(InMemoryStore::new())),
        AnalyticsConfig::default(),
    )
    .with_health(registry.clone());
    seed(&engine, "api", 30, 99.0, 80.0);

    let anomalies = engine.detect_anomalies(&MetricSample::new("api", "operational", 95.0, 80.0));

    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].kind, AnomalyKind::AvailabilityDrop);
    assert_eq!(
        registry.health().components[components::METRICS_STORE].status,
        ComponentStatus::Degraded
    );
}

#[test]
fn test_oversized_windows_do_not_panic() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_with(store.clone());
    seed(&engine, "api", 30, 99.0, 80.0);

    let report = engine.summary_for_window(u32::MAX);
    assert_eq!(report.window_hours, u32::MAX);
    assert_eq!(report.data_quality.total_samples, 30);
    assert_eq!(report.service_health.len(), 1);

    assert_eq!(engine.cleanup_old_data(u32::MAX), 0);
    assert_eq!(store.sample_count(), 30);
}

#[test]
fn test_huge_learning_window_still_detects() {
    let store = Arc::new(InMemoryStore::new());
    let config = AnalyticsConfig {
        learning_window_days: 1_000_000_000,
        ..AnalyticsConfig::default()
    };
    let engine = AnalyticsEngine::new(store, config);
    seed(&engine, "api", 30, 99.0, 80.0);

    let anomalies = engine.detect_anomalies(&MetricSample::new("api", "operational", 95.0, 80.0));
    assert_eq!(anomalies.len(), 1);
    assert_eq!(engine.generate_predictions("api", 24).len(), 2);
}
