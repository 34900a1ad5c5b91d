//! Analytics engine configuration
//!
//! Values come from an optional config file and `ANALYTICS_*` environment
//! variables. Every numeric key is read on its own so that one bad value
//! falls back to its default, with a warning, instead of discarding the
//! whole configuration.

use crate::error::AnalyticsError;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 2.0;
pub const DEFAULT_LEARNING_WINDOW_DAYS: u32 = 50;
pub const DEFAULT_MIN_SAMPLES: usize = 20;
pub const DEFAULT_HORIZON_HOURS: u32 = 24;
pub const DEFAULT_BASELINE_TTL_SECS: u64 = 3600;
pub const DEFAULT_BASELINE_REFRESH_SAMPLES: u64 = 50;
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// Upper bound for day-based windows
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// Environment prefix for analytics settings
pub const ENV_PREFIX: &str = "ANALYTICS";

/// Tunables of the analytics engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Master switch for detection and forecasting
    pub enabled: bool,
    /// Z-score a sample must strictly exceed to be flagged
    pub anomaly_threshold: f64,
    /// Trailing window used to build baselines and forecast history
    pub learning_window_days: u32,
    /// Samples required before a baseline is produced
    pub min_samples: usize,
    /// Horizon used when a caller supplies an unusable one
    pub default_horizon_hours: u32,
    /// Maximum age of a cached baseline
    pub baseline_ttl_secs: u64,
    /// New samples for a service that force its baseline to be recomputed
    pub baseline_refresh_samples: u64,
    /// Age after which stored rows are purged
    pub retention_days: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            learning_window_days: DEFAULT_LEARNING_WINDOW_DAYS,
            min_samples: DEFAULT_MIN_SAMPLES,
            default_horizon_hours: DEFAULT_HORIZON_HOURS,
            baseline_ttl_secs: DEFAULT_BASELINE_TTL_SECS,
            baseline_refresh_samples: DEFAULT_BASELINE_REFRESH_SAMPLES,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl AnalyticsConfig {
    /// Load from an optional file plus `ANALYTICS_*` environment variables
    pub fn load(path: Option<&Path>) -> Self {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX));

        match builder.build() {
            Ok(settings) => Self::from_settings(&settings),
            Err(e) => {
                warn!(
                    event = "config_coerced",
                    error = %e,
                    "Failed to read analytics configuration, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Build from already-loaded settings, coercing bad values to defaults
    pub fn from_settings(settings: &Config) -> Self {
        let defaults = Self::default();
        Self {
            enabled: read_bool(settings, "enabled", defaults.enabled),
            anomaly_threshold: read_positive(
                settings,
                "anomaly_threshold",
                defaults.anomaly_threshold,
            ),
            learning_window_days: read_days(
                settings,
                "learning_window_days",
                defaults.learning_window_days,
            ),
            min_samples: read_positive(settings, "min_samples", defaults.min_samples as f64)
                .round()
                .max(1.0) as usize,
            default_horizon_hours: read_positive(
                settings,
                "default_horizon_hours",
                defaults.default_horizon_hours as f64,
            )
            .round()
            .max(1.0) as u32,
            baseline_ttl_secs: read_positive(
                settings,
                "baseline_ttl_secs",
                defaults.baseline_ttl_secs as f64,
            ) as u64,
            baseline_refresh_samples: read_positive(
                settings,
                "baseline_refresh_samples",
                defaults.baseline_refresh_samples as f64,
            )
            .round()
            .max(1.0) as u64,
            retention_days: read_days(settings, "retention_days", defaults.retention_days),
        }
    }

    /// Replace unusable values of a programmatically built config
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if let Err(e) = check_positive("anomaly_threshold", self.anomaly_threshold) {
            coerced(&e, defaults.anomaly_threshold);
            self.anomaly_threshold = defaults.anomaly_threshold;
        }
        if self.learning_window_days == 0 {
            self.learning_window_days = defaults.learning_window_days;
            warn_zero("learning_window_days", defaults.learning_window_days);
        }
        self.learning_window_days =
            clamp_days("learning_window_days", self.learning_window_days as f64);
        if self.min_samples == 0 {
            self.min_samples = defaults.min_samples;
            warn_zero("min_samples", defaults.min_samples);
        }
        if self.default_horizon_hours == 0 {
            self.default_horizon_hours = defaults.default_horizon_hours;
            warn_zero("default_horizon_hours", defaults.default_horizon_hours);
        }
        if self.baseline_refresh_samples == 0 {
            self.baseline_refresh_samples = defaults.baseline_refresh_samples;
            warn_zero("baseline_refresh_samples", defaults.baseline_refresh_samples);
        }
        if self.retention_days == 0 {
            self.retention_days = defaults.retention_days;
            warn_zero("retention_days", defaults.retention_days);
        }
        self.retention_days = clamp_days("retention_days", self.retention_days as f64);
        self
    }

    /// Resolve a caller-supplied forecast horizon
    pub fn horizon_or_default(&self, horizon_hours: u32) -> u32 {
        if horizon_hours == 0 {
            warn_zero("horizon_hours", self.default_horizon_hours);
            self.default_horizon_hours
        } else {
            horizon_hours
        }
    }
}

fn check_positive(key: &str, value: f64) -> Result<f64, AnalyticsError> {
    if !value.is_finite() {
        return Err(AnalyticsError::InvalidConfig {
            key: key.to_string(),
            reason: format!("{} is not a finite number", value),
        });
    }
    if value <= 0.0 {
        return Err(AnalyticsError::InvalidConfig {
            key: key.to_string(),
            reason: format!("{} must be positive", value),
        });
    }
    Ok(value)
}

fn read_positive(settings: &Config, key: &str, default: f64) -> f64 {
    let parsed = match settings.get::<f64>(key) {
        Ok(value) => check_positive(key, value),
        Err(ConfigError::NotFound(_)) => return default,
        Err(e) => Err(AnalyticsError::InvalidConfig {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    };

    parsed.unwrap_or_else(|e| {
        coerced(&e, default);
        default
    })
}

fn read_days(settings: &Config, key: &str, default: u32) -> u32 {
    clamp_days(key, read_positive(settings, key, default as f64).round().max(1.0))
}

fn clamp_days(key: &str, days: f64) -> u32 {
    if days <= MAX_WINDOW_DAYS as f64 {
        return days as u32;
    }
    coerced(
        &AnalyticsError::InvalidConfig {
            key: key.to_string(),
            reason: format!("{} exceeds {} days", days, MAX_WINDOW_DAYS),
        },
        MAX_WINDOW_DAYS,
    );
    MAX_WINDOW_DAYS
}

fn read_bool(settings: &Config, key: &str, default: bool) -> bool {
    match settings.get::<bool>(key) {
        Ok(value) => value,
        Err(ConfigError::NotFound(_)) => default,
        Err(e) => {
            coerced(
                &AnalyticsError::InvalidConfig {
                    key: key.to_string(),
                    reason: e.to_string(),
                },
                default,
            );
            default
        }
    }
}

fn coerced(error: &AnalyticsError, default: impl std::fmt::Display) {
    warn!(
        event = "config_coerced",
        error = %error,
        default = %default,
        "Invalid analytics setting replaced by default"
    );
}

fn warn_zero(key: &str, default: impl std::fmt::Display) {
    coerced(
        &AnalyticsError::InvalidConfig {
            key: key.to_string(),
            reason: "0 must be positive".to_string(),
        },
        default,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Config {
        let mut builder = Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = AnalyticsConfig::from_settings(&settings(&[]));
        assert_eq!(config, AnalyticsConfig::default());
    }

    #[test]
    fn test_valid_values_are_used() {
        let config = AnalyticsConfig::from_settings(&settings(&[
            ("anomaly_threshold", "2.5"),
            ("learning_window_days", "7"),
            ("min_samples", "30"),
            ("enabled", "false"),
        ]));
        assert_eq!(config.anomaly_threshold, 2.5);
        assert_eq!(config.learning_window_days, 7);
        assert_eq!(config.min_samples, 30);
        assert!(!config.enabled);
    }

    #[test]
    fn test_non_numeric_threshold_coerced() {
        let config = AnalyticsConfig::from_settings(&settings(&[
            ("anomaly_threshold", "very-high"),
            ("default_horizon_hours", "soon"),
        ]));
        assert_eq!(config.anomaly_threshold, DEFAULT_ANOMALY_THRESHOLD);
        assert_eq!(config.default_horizon_hours, DEFAULT_HORIZON_HOURS);
    }

    #[test]
    fn test_non_positive_values_coerced() {
        let config = AnalyticsConfig::from_settings(&settings(&[
            ("anomaly_threshold", "-1"),
            ("learning_window_days", "0"),
        ]));
        assert_eq!(config.anomaly_threshold, DEFAULT_ANOMALY_THRESHOLD);
        assert_eq!(config.learning_window_days, DEFAULT_LEARNING_WINDOW_DAYS);
    }

    #[test]
    fn test_sanitized_replaces_nan() {
        let config = AnalyticsConfig {
            anomaly_threshold: f64::NAN,
            min_samples: 0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(config.anomaly_threshold, DEFAULT_ANOMALY_THRESHOLD);
        assert_eq!(config.min_samples, DEFAULT_MIN_SAMPLES);
    }

    #[test]
    fn test_oversized_windows_clamped() {
        let config = AnalyticsConfig::from_settings(&settings(&[
            ("learning_window_days", "1e12"),
            ("retention_days", "100000"),
        ]));
        assert_eq!(config.learning_window_days, MAX_WINDOW_DAYS);
        assert_eq!(config.retention_days, MAX_WINDOW_DAYS);

        let config = AnalyticsConfig {
            learning_window_days: u32::MAX,
            retention_days: 365,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(config.learning_window_days, MAX_WINDOW_DAYS);
        assert_eq!(config.retention_days, 365);
    }

    #[test]
    fn test_horizon_or_default() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.horizon_or_default(0), DEFAULT_HORIZON_HOURS);
        assert_eq!(config.horizon_or_default(48), 48);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let config = AnalyticsConfig::load(Some(Path::new("/nonexistent/analytics.toml")));
        assert!(config.anomaly_threshold > 0.0);
    }
}
