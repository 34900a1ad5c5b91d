//! In-process metrics store

use super::MetricsStore;
use crate::baseline::mean;
use crate::error::StoreError;
use crate::models::{
    AnomalyRecord, DataQuality, MetricPoint, MetricSample, PredictionRecord, ServiceHealthSummary,
    StatusObservation, SummaryAggregate,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Tables {
    samples: Vec<MetricSample>,
    anomalies: Vec<AnomalyRecord>,
    predictions: Vec<PredictionRecord>,
}

/// Metrics store kept entirely in memory
///
/// Nothing survives a restart. Used by tests and when no database path is
/// configured.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::LockPoisoned)
    }

    /// Newest-first samples of a service within the window
    fn recent_samples<'a>(
        tables: &'a Tables,
        service_name: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Vec<&'a MetricSample> {
        let mut matching: Vec<&MetricSample> = tables
            .samples
            .iter()
            .rev()
            .filter(|s| s.service_name == service_name && s.timestamp >= since)
            .collect();
        // Stable sort keeps later insertions first among equal timestamps
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching.truncate(limit);
        matching
    }

    pub fn sample_count(&self) -> usize {
        self.read().map(|t| t.samples.len()).unwrap_or(0)
    }

    pub fn anomalies(&self) -> Vec<AnomalyRecord> {
        self.read().map(|t| t.anomalies.clone()).unwrap_or_default()
    }

    pub fn predictions(&self) -> Vec<PredictionRecord> {
        self.read().map(|t| t.predictions.clone()).unwrap_or_default()
    }
}

impl MetricsStore for InMemoryStore {
    fn insert_sample(&self, sample: &MetricSample) -> Result<(), StoreError> {
        self.write()?.samples.push(sample.clone());
        Ok(())
    }

    fn query_recent(
        &self,
        service_name: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MetricPoint>, StoreError> {
        let tables = self.read()?;
        Ok(Self::recent_samples(&tables, service_name, since, limit)
            .into_iter()
            .map(MetricPoint::from)
            .collect())
    }

    fn query_recent_statuses(
        &self,
        service_name: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StatusObservation>, StoreError> {
        let tables = self.read()?;
        Ok(Self::recent_samples(&tables, service_name, since, limit)
            .into_iter()
            .map(|s| StatusObservation {
                status: s.status.clone(),
                timestamp: s.timestamp,
            })
            .collect())
    }

    fn insert_anomaly(&self, record: &AnomalyRecord) -> Result<(), StoreError> {
        self.write()?.anomalies.push(record.clone());
        Ok(())
    }

    fn insert_prediction(&self, record: &PredictionRecord) -> Result<(), StoreError> {
        self.write()?.predictions.push(record.clone());
        Ok(())
    }

    fn aggregate_summary(&self, since: DateTime<Utc>) -> Result<SummaryAggregate, StoreError> {
        let tables = self.read()?;

        let mut anomaly_counts = BTreeMap::new();
        for anomaly in tables.anomalies.iter().filter(|a| a.timestamp >= since) {
            *anomaly_counts.entry(anomaly.severity).or_insert(0) += 1;
        }

        let mut prediction_counts = BTreeMap::new();
        for prediction in tables.predictions.iter().filter(|p| p.timestamp >= since) {
            *prediction_counts.entry(prediction.classification).or_insert(0) += 1;
        }

        let mut per_service: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
        for sample in tables.samples.iter().filter(|s| s.timestamp >= since) {
            let entry = per_service.entry(sample.service_name.as_str()).or_default();
            entry.0.push(sample.availability_score);
            entry.1.push(sample.performance_score);
        }
        let mut service_health: Vec<ServiceHealthSummary> = per_service
            .into_iter()
            .map(|(name, (availability, performance))| ServiceHealthSummary {
                service_name: name.to_string(),
                avg_availability: (!availability.is_empty()).then(|| mean(&availability)),
                avg_performance: (!performance.is_empty()).then(|| mean(&performance)),
            })
            .collect();
        service_health.sort_by(|a, b| {
            b.avg_availability
                .partial_cmp(&a.avg_availability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let services: HashSet<&str> = tables
            .samples
            .iter()
            .map(|s| s.service_name.as_str())
            .collect();
        let data_quality = DataQuality {
            total_samples: tables.samples.len() as u64,
            distinct_services: services.len() as u64,
            oldest_sample: tables.samples.iter().map(|s| s.timestamp).min(),
            newest_sample: tables.samples.iter().map(|s| s.timestamp).max(),
        };

        Ok(SummaryAggregate {
            anomaly_counts,
            service_health,
            prediction_counts,
            data_quality,
        })
    }

    fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut tables = self.write()?;
        let before = tables.samples.len();
        tables.samples.retain(|s| s.timestamp >= cutoff);
        tables.anomalies.retain(|a| a.timestamp >= cutoff);
        tables.predictions.retain(|p| p.timestamp >= cutoff);
        Ok(before - tables.samples.len())
    }
}
