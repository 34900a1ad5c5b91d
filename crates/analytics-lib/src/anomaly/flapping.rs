//! Status flapping detection
//!
//! A service is flapping when its recent health checks report more than two
//! distinct status codes. The rule ignores baselines entirely.

use crate::models::{AnomalyKind, AnomalyRecord, MetricSample, Severity, StatusObservation};
use chrono::Duration;
use std::collections::{BTreeMap, HashSet};

/// Window of status history inspected
pub const FLAPPING_WINDOW_MINUTES: i64 = 60;

/// Maximum number of recent statuses inspected
pub const FLAPPING_MAX_OBSERVATIONS: usize = 10;

/// Distinct statuses tolerated before a service counts as flapping
const MAX_DISTINCT_STATUSES: usize = 2;

/// Fixed confidence of flapping anomalies
const FLAPPING_CONFIDENCE: f64 = 75.0;

/// Detects rapid alternation between status codes
#[derive(Debug, Clone)]
pub struct FlappingDetector {
    /// How far back statuses are fetched
    pub window: Duration,
    /// How many of the newest statuses are considered
    pub max_observations: usize,
}

impl FlappingDetector {
    /// Detect flapping from statuses ordered newest first
    ///
    /// Returns `None` when fewer than two statuses are available.
    pub fn detect(
        &self,
        sample: &MetricSample,
        recent_statuses: &[StatusObservation],
    ) -> Option<AnomalyRecord> {
        let observed: Vec<&StatusObservation> =
            recent_statuses.iter().take(self.max_observations).collect();
        if observed.len() < 2 {
            return None;
        }

        let distinct: HashSet<&str> = observed.iter().map(|o| o.status.as_str()).collect();
        if distinct.len() <= MAX_DISTINCT_STATUSES {
            return None;
        }

        let mut affected_metrics = BTreeMap::new();
        affected_metrics.insert("distinct_statuses".to_string(), distinct.len() as f64);
        affected_metrics.insert("observations".to_string(), observed.len() as f64);

        Some(AnomalyRecord {
            timestamp: sample.timestamp,
            service_name: sample.service_name.clone(),
            kind: AnomalyKind::ServiceFlapping,
            severity: Severity::Warning,
            description: format!(
                "Service status flapping detected: {} different statuses in the last hour",
                distinct.len()
            ),
            confidence: FLAPPING_CONFIDENCE,
            affected_metrics,
        })
    }
}

impl Default for FlappingDetector {
    fn default() -> Self {
        Self {
            window: Duration::minutes(FLAPPING_WINDOW_MINUTES),
            max_observations: FLAPPING_MAX_OBSERVATIONS,
        }
    }
}
