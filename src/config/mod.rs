//! Application configuration.
//!
//! Loaded from YAML files and `DOZOR__`-prefixed environment variables, then
//! resolved once at startup into a [`Topology`] plus runtime settings. Every
//! resolution error is fatal: the process never serves with a partially
//! resolvable topology.

mod duration;
mod topology;

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::ThresholdError;
use crate::graph::GraphError;

pub use duration::parse_duration;
pub use topology::Topology;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "dozor.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "DOZOR_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "DOZOR";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "DOZOR_LOG";

/// Errors raised while loading or resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported duration format: {0}")]
    InvalidDuration(String),

    #[error("Unknown component '{name}' referenced by {context}")]
    UnknownComponent { context: String, name: String },

    #[error("Duplicate component: {0}")]
    DuplicateComponent(String),

    #[error("Threshold config missing for component: {0}")]
    MissingThreshold(String),

    #[error("Invalid threshold for component {name}: {source}")]
    Threshold {
        name: String,
        source: ThresholdError,
    },

    #[error("Invalid dependency graph: {0}")]
    Graph(#[from] GraphError),

    #[error("Unsupported check type: {0}")]
    UnsupportedCheckType(String),

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deployment labels used in alert messages.
    pub context: ContextConfig,
    /// Evaluation windows and debounce timing.
    pub evaluation: EvaluationConfig,
    /// Runtime loop sizing.
    pub runtime: RuntimeConfig,
    /// HTTP ingestion listener.
    pub api: ApiConfig,
    /// Durable storage backend.
    pub storage: StorageConfig,
    /// Shared dirty set and temporal buckets.
    pub redis: RedisConfig,
    /// Telegram alert delivery.
    pub telegram: TelegramAlertConfig,
    /// Declared components.
    pub components: Vec<ComponentConfig>,
    /// Dependency edges by component name.
    pub dependencies: Vec<DependencyConfig>,
    /// Thresholds by component name.
    pub thresholds: BTreeMap<String, ThresholdItemConfig>,
    /// Active health checks.
    pub checks: Vec<CheckConfig>,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `dozor.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `DOZOR_CONFIG` environment variable (if set)
    /// 4. Environment variables with `DOZOR` prefix and `__` separator
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parse configuration from a YAML document, without file or env layers.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// Deployment labels.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub project: String,
    pub environment: String,
    pub stack: Option<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            project: "dozor".to_string(),
            environment: "local".to_string(),
            stack: None,
        }
    }
}

/// Evaluation timing, as duration strings (`500ms`, `30s`, `5m`, `1h`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Sliding window for threshold counts.
    pub window: String,
    /// Quiet period required before an elevated component recovers.
    pub recovery_window: String,
    /// Span over which a burst of dirty components is coalesced.
    pub debounce: String,
    /// Wait for a wake-up before draining the dirty set anyway.
    pub idle_poll: String,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            window: "5m".to_string(),
            recovery_window: "2m".to_string(),
            debounce: "500ms".to_string(),
            idle_poll: "250ms".to_string(),
        }
    }
}

/// Evaluation timing with every duration parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationSettings {
    pub window: Duration,
    pub recovery_window: Duration,
    pub debounce: Duration,
    pub idle_poll: Duration,
}

impl EvaluationConfig {
    pub fn resolve(&self) -> Result<EvaluationSettings, ConfigError> {
        let idle_poll = parse_duration(&self.idle_poll)?;
        if idle_poll.is_zero() {
            return Err(ConfigError::Invalid {
                field: "evaluation.idle_poll",
                message: "must be > 0".to_string(),
            });
        }

        Ok(EvaluationSettings {
            window: parse_duration(&self.window)?,
            recovery_window: parse_duration(&self.recovery_window)?,
            debounce: parse_duration(&self.debounce)?,
            idle_poll,
        })
    }
}

/// Runtime loop sizing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Capacity of the dirty wake-up queue.
    pub queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}

/// HTTP listener.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ApiConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `memory` or `sqlite`.
    #[serde(rename = "type")]
    pub storage_type: String,
    /// Database file for `sqlite`.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: "sqlite".to_string(),
            path: "data/dozor.db".to_string(),
        }
    }
}

/// Redis connection for the shared dirty set and temporal buckets.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub enabled: bool,
    pub uri: String,
    pub key_prefix: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            uri: "redis://localhost:6379".to_string(),
            key_prefix: None,
        }
    }
}

/// Telegram delivery settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramAlertConfig {
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
    /// Overrides the Bot API base URL.
    pub api_base: Option<String>,
}

/// A declared component.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentConfig {
    pub name: String,
}

/// A dependency edge by component name.
#[derive(Debug, Clone, Deserialize)]
pub struct DependencyConfig {
    pub upstream: String,
    pub downstream: String,
}

/// Signal counts that trip CRITICAL and DEGRADED.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ThresholdItemConfig {
    pub critical: u32,
    pub degraded: u32,
}

/// An active health check.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckConfig {
    pub component: String,
    #[serde(rename = "type")]
    pub check_type: String,
    pub url: String,
    pub interval: String,
    pub timeout: String,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    #[serde(default)]
    pub body_contains: Option<String>,
    #[serde(default)]
    pub content_type_contains: Option<String>,
}

fn default_failure_threshold() -> u32 {
    1
}

fn default_expected_status() -> u16 {
    200
}
