//! Metrics store contract and backends
//!
//! The engine only talks to storage through [`MetricsStore`]:
//! - `InMemoryStore` keeps everything in process memory
//! - `SqliteStore` persists samples, anomalies and predictions to SQLite

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::models::{
    AnomalyRecord, MetricPoint, MetricSample, PredictionRecord, StatusObservation,
    SummaryAggregate,
};
use chrono::{DateTime, Duration, Utc};

/// Maximum number of rows the engine requests in a single query
pub const MAX_QUERY_ROWS: usize = 1000;

/// Start of the trailing `span` ending at `now`
///
/// Spans reaching past the earliest representable instant start there.
pub fn window_start(now: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(span)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Time-series storage for health samples and derived records
pub trait MetricsStore: Send + Sync {
    /// Append one health sample
    fn insert_sample(&self, sample: &MetricSample) -> Result<(), StoreError>;

    /// Most recent samples of a service at or after `since`, newest first
    fn query_recent(
        &self,
        service_name: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MetricPoint>, StoreError>;

    /// Most recent status codes of a service at or after `since`, newest first
    fn query_recent_statuses(
        &self,
        service_name: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StatusObservation>, StoreError>;

    fn insert_anomaly(&self, record: &AnomalyRecord) -> Result<(), StoreError>;

    fn insert_prediction(&self, record: &PredictionRecord) -> Result<(), StoreError>;

    /// Aggregate anomalies, predictions and service health recorded at or
    /// after `since`; data quality covers the whole store
    fn aggregate_summary(&self, since: DateTime<Utc>) -> Result<SummaryAggregate, StoreError>;

    /// Delete every sample, anomaly and prediction older than `cutoff`,
    /// returning the number of samples removed
    fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}
