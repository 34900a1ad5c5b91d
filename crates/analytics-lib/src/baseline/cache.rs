//! Baseline cache with time and sample-count invalidation

use crate::error::Outcome;
use crate::models::Baseline;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    baseline: Baseline,
    computed_at: DateTime<Utc>,
    samples_since: u64,
}

/// Per-service baseline cache
///
/// An entry is served until it is older than the TTL or until enough new
/// samples were recorded for its service. Lookups and computations happen
/// under one mutex, so two callers never compute the same baseline at once.
#[derive(Debug)]
pub struct BaselineCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    refresh_after_samples: u64,
}

impl BaselineCache {
    pub fn new(ttl: Duration, refresh_after_samples: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            refresh_after_samples: refresh_after_samples.max(1),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // Entries stay consistent even if a holder panicked mid-computation
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.computed_at < self.ttl && entry.samples_since < self.refresh_after_samples
    }

    /// Return a fresh cached baseline, or run `compute` and cache its result
    ///
    /// Only `Outcome::Ready` results are cached.
    pub fn get_or_compute<F>(&self, service_name: &str, now: DateTime<Utc>, compute: F) -> Outcome<Baseline>
    where
        F: FnOnce() -> Outcome<Baseline>,
    {
        let mut entries = self.entries();

        if let Some(entry) = entries.get(service_name) {
            if self.is_fresh(entry, now) {
                return Outcome::Ready(entry.baseline.clone());
            }
            debug!(service = %service_name, "Cached baseline is stale, recomputing");
        }

        let outcome = compute();
        match &outcome {
            Outcome::Ready(baseline) => {
                entries.insert(
                    service_name.to_string(),
                    CacheEntry {
                        baseline: baseline.clone(),
                        computed_at: now,
                        samples_since: 0,
                    },
                );
            }
            _ => {
                entries.remove(service_name);
            }
        }
        outcome
    }

    /// Count a newly recorded sample against the service's cached baseline
    pub fn note_sample(&self, service_name: &str) {
        if let Some(entry) = self.entries().get_mut(service_name) {
            entry.samples_since += 1;
        }
    }

    pub fn get(&self, service_name: &str) -> Option<Baseline> {
        self.entries().get(service_name).map(|e| e.baseline.clone())
    }

    pub fn invalidate(&self, service_name: &str) -> bool {
        self.entries().remove(service_name).is_some()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
