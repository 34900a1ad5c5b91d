//! Agent configuration

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

/// Database path that selects the in-memory store
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Instance name attached to structured log events
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// API server port for analytics, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// SQLite database file, or `:memory:`
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Interval between retention cleanups in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Optional analytics settings file
    #[serde(default)]
    pub analytics_config_file: Option<PathBuf>,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_database_path() -> PathBuf {
    PathBuf::from("health_analytics.db")
}

fn default_cleanup_interval() -> u64 {
    3600
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            database_path: default_database_path(),
            cleanup_interval_secs: default_cleanup_interval(),
            analytics_config_file: None,
        }
    }
}

impl AgentConfig {
    /// Load configuration from the environment (`AGENT_*`)
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("AGENT"))
            .build()?;

        Ok(Self::from_settings(config))
    }

    fn from_settings(config: config::Config) -> Self {
        let mut agent: Self = config.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!(
                event = "config_coerced",
                error = %e,
                "Invalid agent configuration, using defaults"
            );
            Self::default()
        });
        if agent.cleanup_interval_secs == 0 {
            agent.cleanup_interval_secs = default_cleanup_interval();
        }
        agent
    }

    pub fn uses_in_memory_store(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_DATABASE
    }
}
