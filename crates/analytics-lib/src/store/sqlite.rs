//! SQLite-backed metrics store
//!
//! Timestamps are stored as Unix milliseconds so that range filters and
//! ordering stay numeric. Anomaly metric maps are stored as JSON text.

use super::MetricsStore;
use crate::error::StoreError;
use crate::models::{
    AnomalyRecord, DataQuality, MetricPoint, MetricSample, PredictionRecord, ServiceHealthSummary,
    Severity, StatusObservation, SummaryAggregate, TrendDirection,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS service_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp_ms INTEGER NOT NULL,
    service_name TEXT NOT NULL,
    status TEXT NOT NULL,
    response_time REAL,
    availability_score REAL,
    performance_score REAL
);

CREATE TABLE IF NOT EXISTS anomalies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp_ms INTEGER NOT NULL,
    service_name TEXT NOT NULL,
    anomaly_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    description TEXT,
    confidence_score REAL,
    affected_metrics TEXT
);

CREATE TABLE IF NOT EXISTS predictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp_ms INTEGER NOT NULL,
    service_name TEXT NOT NULL,
    metric TEXT NOT NULL,
    classification TEXT NOT NULL,
    predicted_value REAL,
    trend_slope REAL,
    confidence_score REAL,
    horizon_hours INTEGER,
    description TEXT
);

CREATE INDEX IF NOT EXISTS idx_service_metrics_name_ts
    ON service_metrics(service_name, timestamp_ms);
CREATE INDEX IF NOT EXISTS idx_anomalies_ts ON anomalies(timestamp_ms);
CREATE INDEX IF NOT EXISTS idx_predictions_ts ON predictions(timestamp_ms);
"#;

/// Metrics store persisted in a SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the tables exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        let store = Self::with_connection(conn)?;
        info!(path = %path.as_ref().display(), "Analytics database opened");
        Ok(store)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(table: &'static str, ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| StoreError::CorruptRow {
        table,
        reason: format!("timestamp {} out of range", ms),
    })
}

impl MetricsStore for SqliteStore {
    fn insert_sample(&self, sample: &MetricSample) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO service_metrics
                (timestamp_ms, service_name, status, response_time,
                 availability_score, performance_score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                to_millis(sample.timestamp),
                sample.service_name,
                sample.status,
                sample.response_time,
                sample.availability_score,
                sample.performance_score,
            ],
        )?;
        Ok(())
    }

    fn query_recent(
        &self,
        service_name: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MetricPoint>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp_ms, availability_score, performance_score, response_time
             FROM service_metrics
             WHERE service_name = ?1 AND timestamp_ms >= ?2
             ORDER BY timestamp_ms DESC, id DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![service_name, to_millis(since), limit as i64],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                ))
            },
        )?;

        let mut points = Vec::new();
        for row in rows {
            let (ms, availability, performance, response_time) = row?;
            points.push(MetricPoint {
                timestamp: from_millis("service_metrics", ms)?,
                availability,
                performance,
                response_time,
            });
        }
        Ok(points)
    }

    fn query_recent_statuses(
        &self,
        service_name: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StatusObservation>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT status, timestamp_ms
             FROM service_metrics
             WHERE service_name = ?1 AND timestamp_ms >= ?2
             ORDER BY timestamp_ms DESC, id DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![service_name, to_millis(since), limit as i64],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )?;

        let mut statuses = Vec::new();
        for row in rows {
            let (status, ms) = row?;
            statuses.push(StatusObservation {
                status,
                timestamp: from_millis("service_metrics", ms)?,
            });
        }
        Ok(statuses)
    }

    fn insert_anomaly(&self, record: &AnomalyRecord) -> Result<(), StoreError> {
        let affected = serde_json::to_string(&record.affected_metrics)?;
        self.conn()?.execute(
            "INSERT INTO anomalies
                (timestamp_ms, service_name, anomaly_type, severity,
                 description, confidence_score, affected_metrics)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                to_millis(record.timestamp),
                record.service_name,
                record.kind.as_str(),
                record.severity.as_str(),
                record.description,
                record.confidence,
                affected,
            ],
        )?;
        Ok(())
    }

    fn insert_prediction(&self, record: &PredictionRecord) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO predictions
                (timestamp_ms, service_name, metric, classification, predicted_value,
                 trend_slope, confidence_score, horizon_hours, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                to_millis(record.timestamp),
                record.service_name,
                record.metric.as_str(),
                record.classification.as_str(),
                record.predicted_value,
                record.trend_slope,
                record.confidence,
                record.horizon_hours,
                record.description,
            ],
        )?;
        Ok(())
    }

    fn aggregate_summary(&self, since: DateTime<Utc>) -> Result<SummaryAggregate, StoreError> {
        let conn = self.conn()?;
        let since_ms = to_millis(since);

        let mut anomaly_counts = BTreeMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT severity, COUNT(*) FROM anomalies
                 WHERE timestamp_ms >= ?1 GROUP BY severity",
            )?;
            let rows = stmt.query_map(params![since_ms], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (severity, count) = row?;
                let severity = Severity::parse(&severity).ok_or_else(|| StoreError::CorruptRow {
                    table: "anomalies",
                    reason: format!("unknown severity {:?}", severity),
                })?;
                anomaly_counts.insert(severity, count.max(0) as u64);
            }
        }

        let mut service_health = Vec::new();
        {
            let mut stmt = conn.prepare(
                "SELECT service_name, AVG(availability_score), AVG(performance_score)
                 FROM service_metrics
                 WHERE timestamp_ms >= ?1
                 GROUP BY service_name
                 ORDER BY AVG(availability_score) DESC",
            )?;
            let rows = stmt.query_map(params![since_ms], |row| {
                Ok(ServiceHealthSummary {
                    service_name: row.get(0)?,
                    avg_availability: row.get(1)?,
                    avg_performance: row.get(2)?,
                })
            })?;
            for row in rows {
                service_health.push(row?);
            }
        }

        let mut prediction_counts = BTreeMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT classification, COUNT(*) FROM predictions
                 WHERE timestamp_ms >= ?1 GROUP BY classification",
            )?;
            let rows = stmt.query_map(params![since_ms], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (classification, count) = row?;
                let direction =
                    TrendDirection::parse(&classification).ok_or_else(|| StoreError::CorruptRow {
                        table: "predictions",
                        reason: format!("unknown classification {:?}", classification),
                    })?;
                prediction_counts.insert(direction, count.max(0) as u64);
            }
        }

        let (total, distinct, oldest, newest) = conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT service_name), MIN(timestamp_ms), MAX(timestamp_ms)
             FROM service_metrics",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            },
        )?;
        let data_quality = DataQuality {
            total_samples: total.max(0) as u64,
            distinct_services: distinct.max(0) as u64,
            oldest_sample: oldest.map(|ms| from_millis("service_metrics", ms)).transpose()?,
            newest_sample: newest.map(|ms| from_millis("service_metrics", ms)).transpose()?,
        };

        Ok(SummaryAggregate {
            anomaly_counts,
            service_health,
            prediction_counts,
            data_quality,
        })
    }

    fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let cutoff_ms = to_millis(cutoff);

        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM service_metrics WHERE timestamp_ms < ?1",
            params![cutoff_ms],
        )?;
        tx.execute("DELETE FROM anomalies WHERE timestamp_ms < ?1", params![cutoff_ms])?;
        tx.execute("DELETE FROM predictions WHERE timestamp_ms < ?1", params![cutoff_ms])?;
        tx.commit()?;

        conn.execute_batch("VACUUM")?;
        debug!(removed, "Purged old analytics rows");
        Ok(removed)
    }
}
