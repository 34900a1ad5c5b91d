//! Per-service statistical baselines
//!
//! A baseline holds the mean and sample standard deviation of availability,
//! performance and response time over the learning window. Baselines are
//! computed lazily and cached until they go stale.

mod cache;
mod stats;

pub use cache::BaselineCache;
pub use stats::{mean, sample_std};

use crate::error::Outcome;
use crate::models::{Baseline, MetricPoint};
use crate::store::{window_start, MetricsStore, MAX_QUERY_ROWS};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Computes and caches baselines from the metrics store
#[derive(Debug)]
pub struct BaselineCalculator {
    /// Trailing window of samples considered
    pub learning_window: Duration,
    /// Rows required before a baseline is produced
    pub min_samples: usize,
    cache: BaselineCache,
}

impl BaselineCalculator {
    pub fn new(learning_window_days: u32, min_samples: usize, cache: BaselineCache) -> Self {
        Self {
            learning_window: Duration::days(learning_window_days as i64),
            min_samples,
            cache,
        }
    }

    pub fn cache(&self) -> &BaselineCache {
        &self.cache
    }

    /// Cached baseline for a service, computing it when missing or stale
    ///
    /// `on_miss` runs only when the store was queried.
    pub fn resolve(
        &self,
        store: &dyn MetricsStore,
        service_name: &str,
        now: DateTime<Utc>,
        on_miss: impl FnOnce(),
    ) -> Outcome<Baseline> {
        self.cache.get_or_compute(service_name, now, || {
            on_miss();
            self.compute(store, service_name, now)
        })
    }

    /// Compute a baseline from the store, bypassing the cache
    pub fn compute(
        &self,
        store: &dyn MetricsStore,
        service_name: &str,
        now: DateTime<Utc>,
    ) -> Outcome<Baseline> {
        let since = window_start(now, self.learning_window);
        match store.query_recent(service_name, since, MAX_QUERY_ROWS) {
            Ok(points) => Self::from_points(service_name, &points, self.min_samples),
            Err(e) => e.into(),
        }
    }

    /// Build a baseline from rows already fetched
    ///
    /// Null values are excluded per dimension; `sample_count` is the number
    /// of rows.
    pub fn from_points(
        service_name: &str,
        points: &[MetricPoint],
        min_samples: usize,
    ) -> Outcome<Baseline> {
        if points.len() < min_samples {
            debug!(
                service = %service_name,
                available = points.len(),
                needed = min_samples,
                "Insufficient data for baseline"
            );
            return Outcome::InsufficientData {
                needed: min_samples,
                available: points.len(),
            };
        }

        let availability: Vec<f64> = points.iter().filter_map(|p| p.availability).collect();
        let performance: Vec<f64> = points.iter().filter_map(|p| p.performance).collect();
        let response_times: Vec<f64> = points.iter().filter_map(|p| p.response_time).collect();

        Outcome::Ready(Baseline {
            service_name: service_name.to_string(),
            availability_mean: mean(&availability),
            availability_std: sample_std(&availability),
            performance_mean: mean(&performance),
            performance_std: sample_std(&performance),
            response_time_mean: mean(&response_times),
            response_time_std: sample_std(&response_times),
            sample_count: points.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricSample;
    use crate::store::InMemoryStore;

    fn point(availability: Option<f64>, performance: Option<f64>, rt: Option<f64>) -> MetricPoint {
        MetricPoint {
            timestamp: Utc::now(),
            availability,
            performance,
            response_time: rt,
        }
    }

    fn calculator(min_samples: usize) -> BaselineCalculator {
        BaselineCalculator::new(
            30,
            min_samples,
            BaselineCache::new(Duration::hours(1), 50),
        )
    }

    #[test]
    fn test_insufficient_rows() {
        let points = vec![point(Some(99.0), Some(80.0), None); 5];
        let outcome = BaselineCalculator::from_points("api", &points, 20);
        assert!(matches!(
            outcome,
            Outcome::InsufficientData {
                needed: 20,
                available: 5
            }
        ));
    }

    #[test]
    fn test_nulls_excluded_per_dimension() {
        let points = vec![
            point(Some(1.0), Some(10.0), None),
            point(Some(2.0), None, None),
            point(Some(3.0), Some(30.0), Some(0.5)),
            point(Some(4.0), None, None),
            point(Some(5.0), Some(20.0), None),
        ];
        let baseline = BaselineCalculator::from_points("api", &points, 5)
            .ready()
            .unwrap();

        assert_eq!(baseline.sample_count, 5);
        assert!((baseline.availability_mean - 3.0).abs() < 1e-9);
        assert!((baseline.availability_std - 1.5811).abs() < 1e-4);
        assert!((baseline.performance_mean - 20.0).abs() < 1e-9);
        assert!((baseline.performance_std - 10.0).abs() < 1e-9);
        // A single response time leaves its std at zero
        assert_eq!(baseline.response_time_mean, 0.5);
        assert_eq!(baseline.response_time_std, 0.0);
    }

    #[test]
    fn test_resolve_uses_cache() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        for i in 0..25 {
            store
                .insert_sample(
                    &MetricSample::new("api", "ok", 99.0 + (i % 2) as f64, 80.0)
                        .at(now - Duration::minutes(i)),
                )
                .unwrap();
        }
        let calculator = calculator(20);

        let mut misses = 0;
        let first = calculator.resolve(&store, "api", now, || misses += 1);
        assert!(first.is_ready());
        let second = calculator.resolve(&store, "api", now, || misses += 1);
        assert!(second.is_ready());
        assert_eq!(misses, 1);
        assert_eq!(calculator.cache().len(), 1);
    }

    #[test]
    fn test_compute_ignores_samples_outside_window() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        for i in 0..25 {
            store
                .insert_sample(
                    &MetricSample::new("api", "ok", 99.0, 80.0).at(now - Duration::days(60 + i)),
                )
                .unwrap();
        }
        let outcome = calculator(20).compute(&store, "api", now);
        assert!(matches!(
            outcome,
            Outcome::InsufficientData { available: 0, .. }
        ));
    }
}
