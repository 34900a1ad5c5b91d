//! Z-score anomaly detection
//!
//! Compares a new sample against its service baseline, one dimension at a
//! time. Availability and performance are checked independently; the
//! flapping rule runs alongside them.

use super::FlappingDetector;
use crate::models::{AnomalyKind, AnomalyRecord, Baseline, MetricSample, Severity, StatusObservation};
use std::collections::BTreeMap;

/// Z-score above which an anomaly is critical
const CRITICAL_Z_SCORE: f64 = 3.0;

/// Distance of a value from its baseline, in standard deviations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScore {
    /// Absolute number of standard deviations from the mean
    pub value: f64,
    /// Whether the observed value lies below the mean
    pub below_mean: bool,
}

impl ZScore {
    /// `None` when the baseline has no variance
    pub fn compute(observed: f64, mean: f64, std_dev: f64) -> Option<Self> {
        if std_dev == 0.0 || !std_dev.is_finite() {
            return None;
        }
        Some(Self {
            value: (observed - mean).abs() / std_dev,
            below_mean: observed < mean,
        })
    }

    pub fn severity(&self) -> Severity {
        if self.value > CRITICAL_Z_SCORE {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }

    /// Confidence 0-100, saturating at three standard deviations
    pub fn confidence(&self) -> f64 {
        (self.value / CRITICAL_Z_SCORE * 100.0).min(100.0)
    }
}

/// Detects availability, performance and flapping anomalies
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    /// Z-score a sample must strictly exceed to be flagged
    pub threshold: f64,
    pub flapping: FlappingDetector,
}

impl AnomalyDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            flapping: FlappingDetector::default(),
        }
    }

    /// Run every check and return all anomalies found
    ///
    /// # Arguments
    /// * `sample` - The sample under test
    /// * `baseline` - Baseline of the sample's service
    /// * `recent_statuses` - Recent status codes of the service, newest first
    pub fn detect(
        &self,
        sample: &MetricSample,
        baseline: &Baseline,
        recent_statuses: &[StatusObservation],
    ) -> Vec<AnomalyRecord> {
        let mut anomalies = Vec::new();
        anomalies.extend(self.check_availability(sample, baseline));
        anomalies.extend(self.check_performance(sample, baseline));
        anomalies.extend(self.flapping.detect(sample, recent_statuses));
        anomalies
    }

    pub fn check_availability(
        &self,
        sample: &MetricSample,
        baseline: &Baseline,
    ) -> Option<AnomalyRecord> {
        let observed = sample.availability_score;
        let z = self.exceeding(observed, baseline.availability_mean, baseline.availability_std)?;

        let kind = if z.below_mean {
            AnomalyKind::AvailabilityDrop
        } else {
            AnomalyKind::UnusualBehavior
        };
        let description = format!(
            "Availability anomaly detected: {:.1}% (baseline: {:.1}%, z-score: {:.2})",
            observed, baseline.availability_mean, z.value
        );
        Some(Self::record(sample, kind, z, description, "availability_score", observed))
    }

    pub fn check_performance(
        &self,
        sample: &MetricSample,
        baseline: &Baseline,
    ) -> Option<AnomalyRecord> {
        let observed = sample.performance_score;
        let z = self.exceeding(observed, baseline.performance_mean, baseline.performance_std)?;

        let kind = if z.below_mean {
            AnomalyKind::PerformanceDegradation
        } else {
            AnomalyKind::UnusualBehavior
        };
        let description = format!(
            "Performance anomaly detected: {:.1} (baseline: {:.1}, z-score: {:.2})",
            observed, baseline.performance_mean, z.value
        );
        Some(Self::record(sample, kind, z, description, "performance_score", observed))
    }

    /// Z-score of `observed` if it strictly exceeds the threshold
    fn exceeding(&self, observed: f64, mean: f64, std_dev: f64) -> Option<ZScore> {
        let z = ZScore::compute(observed, mean, std_dev)?;
        (z.value > self.threshold).then_some(z)
    }

    fn record(
        sample: &MetricSample,
        kind: AnomalyKind,
        z: ZScore,
        description: String,
        metric: &str,
        observed: f64,
    ) -> AnomalyRecord {
        let mut affected_metrics = BTreeMap::new();
        affected_metrics.insert(metric.to_string(), observed);
        affected_metrics.insert("z_score".to_string(), z.value);

        AnomalyRecord {
            timestamp: sample.timestamp,
            service_name: sample.service_name.clone(),
            kind,
            severity: z.severity(),
            description,
            confidence: z.confidence(),
            affected_metrics,
        }
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_ANOMALY_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline(avail_mean: f64, avail_std: f64, perf_mean: f64, perf_std: f64) -> Baseline {
        Baseline {
            service_name: "api".to_string(),
            availability_mean: avail_mean,
            availability_std: avail_std,
            performance_mean: perf_mean,
            performance_std: perf_std,
            response_time_mean: 0.0,
            response_time_std: 0.0,
            sample_count: 100,
        }
    }

    fn sample(availability: f64, performance: f64) -> MetricSample {
        MetricSample::new("api", "operational", availability, performance)
    }

    #[test]
    fn test_critical_drop_caps_confidence() {
        let detector = AnomalyDetector::new(2.0);
        let anomaly = detector
            .check_availability(&sample(90.0, 80.0), &baseline(100.0, 2.0, 80.0, 1.0))
            .unwrap();

        assert_eq!(anomaly.kind, AnomalyKind::AvailabilityDrop);
        assert_eq!(anomaly.severity, Severity::Critical);
        assert_eq!(anomaly.confidence, 100.0);
        assert!((anomaly.affected_metrics["z_score"] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_is_strict() {
        let detector = AnomalyDetector::new(2.0);
        let base = baseline(100.0, 2.0, 80.0, 0.0);

        // z = 2.0 exactly
        assert!(detector.check_availability(&sample(96.0, 80.0), &base).is_none());
        // z = 2.0001
        let flagged = detector
            .check_availability(&sample(95.9998, 80.0), &base)
            .unwrap();
        assert_eq!(flagged.severity, Severity::Warning);
        assert!((flagged.confidence - 2.0001 / 3.0 * 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_variance_never_flags() {
        let detector = AnomalyDetector::new(2.0);
        let base = baseline(100.0, 0.0, 80.0, 0.0);
        assert!(detector.detect(&sample(0.0, 0.0), &base, &[]).is_empty());
    }

    #[test]
    fn test_above_mean_is_unusual_behavior() {
        let detector = AnomalyDetector::new(2.0);
        let base = baseline(90.0, 1.0, 50.0, 5.0);

        let availability = detector.check_availability(&sample(95.0, 50.0), &base).unwrap();
        assert_eq!(availability.kind, AnomalyKind::UnusualBehavior);

        let performance = detector.check_performance(&sample(90.0, 70.0), &base).unwrap();
        assert_eq!(performance.kind, AnomalyKind::UnusualBehavior);
        assert_eq!(performance.severity, Severity::Critical);
    }

    #[test]
    fn test_checks_are_cumulative() {
        let detector = AnomalyDetector::new(2.0);
        let base = baseline(99.0, 0.5, 80.0, 2.0);
        let anomalies = detector.detect(&sample(95.0, 60.0), &base, &[]);

        let kinds: Vec<AnomalyKind> = anomalies.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![AnomalyKind::AvailabilityDrop, AnomalyKind::PerformanceDegradation]
        );
    }

    #[test]
    fn test_end_to_end_availability_drop() {
        let detector = AnomalyDetector::new(2.0);
        let base = baseline(99.0, 0.5, 80.0, 0.0);
        let anomalies = detector.detect(&sample(95.0, 80.0), &base, &[]);

        assert_eq!(anomalies.len(), 1);
        let anomaly = &anomalies[0];
        assert_eq!(anomaly.kind, AnomalyKind::AvailabilityDrop);
        assert_eq!(anomaly.severity, Severity::Critical);
        assert!((anomaly.affected_metrics["z_score"] - 8.0).abs() < 1e-9);
        assert_eq!(anomaly.confidence, 100.0);
        assert_eq!(
            anomaly.description,
            "Availability anomaly detected: 95.0% (baseline: 99.0%, z-score: 8.00)"
        );
    }

    #[test]
    fn test_detection_is_deterministic() {
        let detector = AnomalyDetector::new(2.0);
        let base = baseline(99.0, 0.5, 80.0, 2.0);
        let s = sample(95.0, 60.0);

        let first = serde_json::to_vec(&detector.detect(&s, &base, &[])).unwrap();
        let second = serde_json::to_vec(&detector.detect(&s, &base, &[])).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zscore_helpers() {
        assert!(ZScore::compute(1.0, 1.0, 0.0).is_none());
        let z = ZScore::compute(7.0, 10.0, 1.0).unwrap();
        assert!(z.below_mean);
        assert_eq!(z.value, 3.0);
        // Exactly three deviations is not yet critical
        assert_eq!(z.severity(), Severity::Warning);
        assert_eq!(z.confidence(), 100.0);
    }
}
