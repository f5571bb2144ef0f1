//! Configuration management for the CRPT API client.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{CrptError, Result};
use crate::ratelimit::{AdmissionPolicy, TimeWindow};

/// Prefix of environment variables that override file configuration.
///
/// Nested keys are separated by a double underscore, e.g.
/// `CRPT__LIMITER__REQUEST_LIMIT=5`.
pub const ENV_PREFIX: &str = "CRPT";

/// Main configuration for the CRPT API client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrptConfig {
    /// Rate limiting configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// HTTP transport configuration
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Length of one counting window
    #[serde(default = "default_time_unit")]
    pub time_unit: TimeWindow,

    /// Maximum requests per window
    #[serde(default = "default_request_limit")]
    pub request_limit: u64,

    /// Behavior when the window is exhausted
    #[serde(default)]
    pub policy: AdmissionPolicy,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            time_unit: default_time_unit(),
            request_limit: default_request_limit(),
            policy: AdmissionPolicy::default(),
        }
    }
}

fn default_time_unit() -> TimeWindow {
    TimeWindow::Second
}

fn default_request_limit() -> u64 {
    10
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Document creation endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connection establishment timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl TransportConfig {
    /// Whole-request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Connection establishment timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_endpoint() -> String {
    "https://ismp.crpt.ru/api/v3/lk/documents/create".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

impl CrptConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: CrptConfig = serde_yaml::from_str(yaml)
            .map_err(|e| CrptError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional file, overridden by `CRPT__*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_layered(path, None)
    }

    /// Layer `path` under environment overrides.
    ///
    /// `env` replaces the process environment when given.
    fn load_layered(
        path: Option<&Path>,
        env: Option<::config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration");
            builder = builder.add_source(::config::File::from(path));
        }

        let config: CrptConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CrptError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values no client could run with.
    pub fn validate(&self) -> Result<()> {
        if self.limiter.request_limit == 0 {
            return Err(CrptError::Config(
                "limiter.request_limit must be greater than 0".to_string(),
            ));
        }
        if self.transport.endpoint.trim().is_empty() {
            return Err(CrptError::Config(
                "transport.endpoint must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
