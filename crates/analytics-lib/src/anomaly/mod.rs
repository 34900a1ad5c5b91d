//! Anomaly detection for service health samples
//!
//! This module provides detection for:
//! - Availability and performance deviations (z-score against a baseline)
//! - Status flapping (too many distinct statuses within an hour)

mod detector;
mod flapping;

pub use detector::{AnomalyDetector, ZScore};
pub use flapping::{FlappingDetector, FLAPPING_MAX_OBSERVATIONS, FLAPPING_WINDOW_MINUTES};
