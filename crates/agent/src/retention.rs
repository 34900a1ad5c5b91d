//! Periodic purge of expired analytics data

use analytics_lib::{
    health::{components, HealthRegistry},
    AnalyticsEngine,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Run one cleanup pass on a blocking thread and report it as `retention`
///
/// Returns the number of purged samples, or `None` when the pass panicked.
pub async fn run_cleanup(engine: Arc<AnalyticsEngine>, registry: &HealthRegistry) -> Option<usize> {
    let retention_days = engine.config().retention_days;
    match tokio::task::spawn_blocking(move || engine.cleanup_old_data(retention_days)).await {
        Ok(purged) => {
            registry.set_healthy(components::RETENTION);
            Some(purged)
        }
        Err(e) => {
            error!(event = "retention_failed", error = %e, "Retention cleanup task failed");
            registry.set_unhealthy(components::RETENTION, e.to_string());
            None
        }
    }
}

/// Purge data older than the retention window every `interval`
pub async fn retention_loop(
    engine: Arc<AnalyticsEngine>,
    registry: HealthRegistry,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        run_cleanup(engine.clone(), &registry).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_lib::{
        AnalyticsConfig, AnomalyRecord, ComponentStatus, InMemoryStore, MetricPoint,
        MetricSample, MetricsStore, PredictionRecord, StatusObservation, StoreError,
        SummaryAggregate,
    };
    use chrono::{DateTime, Utc};

    /// Store that panics while purging
    struct PanickingPurgeStore(InMemoryStore);

    impl MetricsStore for PanickingPurgeStore {
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
            service_name: &str,
            since: DateTime<Utc>,
            limit: usize,
        ) -> Result<Vec<StatusObservation>, StoreError> {
            self.0.query_recent_statuses(service_name, since, limit)
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

        fn purge_before(&self, _: DateTime<Utc>) -> Result<usize, StoreError> {
            panic!("purge interrupted");
        }
    }

    fn registry() -> HealthRegistry {
        let registry = HealthRegistry::new();
        registry.register(components::RETENTION);
        registry.set_ready(true);
        registry
    }

    #[tokio::test]
    async fn test_cleanup_marks_retention_healthy() {
        let registry = registry();
        registry.set_degraded(components::RETENTION, "previous pass failed");
        let engine = Arc::new(AnalyticsEngine::new(
            Arc::new(InMemoryStore::new()),
            AnalyticsConfig::default(),
        ));

        assert_eq!(run_cleanup(engine, &registry).await, Some(0));
        assert_eq!(
            registry.health().components[components::RETENTION].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_panicked_cleanup_marks_retention_unhealthy() {
        let registry = registry();
        let engine = Arc::new(AnalyticsEngine::new(
            Arc::new(PanickingPurgeStore(InMemoryStore::new())),
            AnalyticsConfig::default(),
        ));

        assert_eq!(run_cleanup(engine, &registry).await, None);
        assert_eq!(
            registry.health().components[components::RETENTION].status,
            ComponentStatus::Unhealthy
        );
        assert!(!registry.readiness().ready);
    }
}
