//! Error and outcome types
//!
//! Engine internals distinguish three outcomes: a usable result, not enough
//! history yet, and a failure. The public engine operations collapse the last
//! two into empty results.

use thiserror::Error;

/// Failures raised by a metrics store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to encode or decode stored payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },

    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Errors surfaced inside the analytics engine
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("metrics store failure: {0}")]
    Storage(#[from] StoreError),

    #[error("invalid configuration value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },
}

/// Three-way result of an engine computation
#[derive(Debug)]
pub enum Outcome<T> {
    /// Computation succeeded
    Ready(T),
    /// Not enough history to compute anything meaningful
    InsufficientData { needed: usize, available: usize },
    /// Computation failed; callers treat this as "no data"
    Failed(AnalyticsError),
}

impl<T> Outcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready(_))
    }

    /// Collapse to an optional value, dropping the reason
    pub fn ready(self) -> Option<T> {
        match self {
            Outcome::Ready(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<StoreError> for Outcome<T> {
    fn from(err: StoreError) -> Self {
        Outcome::Failed(AnalyticsError::Storage(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_collapse() {
        let ready: Outcome<u32> = Outcome::Ready(3);
        assert!(ready.is_ready());
        assert_eq!(ready.ready(), Some(3));

        let short: Outcome<u32> = Outcome::InsufficientData {
            needed: 20,
            available: 4,
        };
        assert!(short.ready().is_none());

        let failed: Outcome<u32> = StoreError::LockPoisoned.into();
        assert!(matches!(
            failed,
            Outcome::Failed(AnalyticsError::Storage(StoreError::LockPoisoned))
        ));
    }

    #[test]
    fn test_error_messages() {
        let err = AnalyticsError::InvalidConfig {
            key: "anomaly_threshold".to_string(),
            reason: "not a number".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid configuration value for anomaly_threshold: not a number"
        );
    }
}
