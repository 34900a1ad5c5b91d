//! Service health analytics library
//!
//! This crate provides the core functionality for:
//! - Per-service statistical baselines with caching
//! - Anomaly detection (z-score deviations and status flapping)
//! - Linear trend prediction
//! - Metrics storage (in memory or SQLite)
//! - Health checks and observability

pub mod anomaly;
pub mod baseline;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod store;

pub use config::AnalyticsConfig;
pub use engine::AnalyticsEngine;
pub use error::{AnalyticsError, Outcome, StoreError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AnalyticsMetrics, StructuredLogger};
pub use store::{InMemoryStore, MetricsStore, SqliteStore};
