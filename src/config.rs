//! Configuration management for Marquee.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{MarqueeError, Result};
use crate::validator;

const ENVIRONMENTS: [&str; 3] = ["development", "staging", "production"];

/// Main configuration for the Marquee service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarqueeConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Storage deadlines
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    /// Deployment environment name (development, staging, production)
    #[serde(default = "default_env")]
    pub env: String,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            env: default_env(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 4000))
}

fn default_env() -> String {
    "development".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Sustained requests per second per client
    #[serde(default = "default_rps")]
    pub requests_per_second: f64,

    /// Maximum burst per client
    #[serde(default = "default_burst")]
    pub burst_capacity: u32,

    /// Enable the rate limiter
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Idle time in seconds after which a client's state is dropped
    #[serde(default = "default_idle_eviction")]
    pub idle_eviction_after_secs: u64,

    /// Eviction sweep interval in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rps(),
            burst_capacity: default_burst(),
            enabled: default_true(),
            idle_eviction_after_secs: default_idle_eviction(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl LimiterConfig {
    pub fn idle_eviction_after(&self) -> Duration {
        Duration::from_secs(self.idle_eviction_after_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_rps() -> f64 {
    2.0
}

fn default_burst() -> u32 {
    4
}

fn default_true() -> bool {
    true
}

fn default_idle_eviction() -> u64 {
    180
}

fn default_sweep_interval() -> u64 {
    60
}

/// Deadlines applied at the storage boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Deadline for list reads in seconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Deadline for single-record reads and writes in seconds
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: default_query_timeout(),
            write_timeout_secs: default_write_timeout(),
        }
    }
}

impl StorageConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

fn default_query_timeout() -> u64 {
    30
}

fn default_write_timeout() -> u64 {
    10
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl MarqueeConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: MarqueeConfig = serde_yaml::from_str(yaml)
            .map_err(|e| MarqueeError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional YAML file, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        let limiter = &self.limiter;
        if limiter.enabled {
            if !(limiter.requests_per_second.is_finite() && limiter.requests_per_second > 0.0) {
                return Err(MarqueeError::Config(
                    "limiter.requests_per_second must be greater than zero".into(),
                ));
            }
            if limiter.burst_capacity == 0 {
                return Err(MarqueeError::Config(
                    "limiter.burst_capacity must be greater than zero".into(),
                ));
            }
            if limiter.sweep_interval_secs == 0 {
                return Err(MarqueeError::Config(
                    "limiter.sweep_interval_secs must be greater than zero".into(),
                ));
            }
        }
        if self.storage.query_timeout_secs == 0 || self.storage.write_timeout_secs == 0 {
            return Err(MarqueeError::Config(
                "storage timeouts must be greater than zero".into(),
            ));
        }
        if !validator::permitted_value(self.server.env.as_str(), &ENVIRONMENTS) {
            return Err(MarqueeError::Config(format!(
                "server.env must be one of {}",
                ENVIRONMENTS.join(", ")
            )));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(MarqueeError::Config(
                "server.request_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
