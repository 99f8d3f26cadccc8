//! Service configuration
//!
//! Defaults cover a local deployment; `from_env` applies `TIDEX_*` overrides
//! and validates the result.

use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::TirThresholds;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Parser message
        reason: String,
    },

    /// The assembled configuration is inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level service configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listener
    pub http: HttpConfig,
    /// Export pipeline
    pub export: ExportConfig,
    /// Time-in-range summary
    pub tir: TirConfig,
    /// Remote bucket service
    pub remote: RemoteConfig,
    /// Logging
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub listen_addr: String,
    /// Maximum accepted request body
    pub body_limit_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9220".to_string(),
            body_limit_bytes: 1024 * 1024,
        }
    }
}

/// Export pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Types always left out of the primary query
    pub exclude_types: Vec<String>,
    /// Allowed `level` values of device parameter events
    pub parameter_levels: Vec<i64>,
    /// Expected output bytes per second of requested span
    pub bytes_per_second: f64,
    /// Upper bound on the capacity reserved before the merge
    pub max_grow_bytes: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            exclude_types: Vec::new(),
            parameter_levels: vec![1, 2],
            bytes_per_second: 1.15,
            max_grow_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Time-in-range settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TirConfig {
    /// Band boundaries
    pub thresholds: TirThresholds,
    /// Minutes represented by one sample
    pub sampling_interval_minutes: u32,
    /// Trailing window used when the request gives no start date
    pub default_window_hours: u32,
}

impl Default for TirConfig {
    fn default() -> Self {
        Self {
            thresholds: TirThresholds::default(),
            sampling_interval_minutes: 5,
            default_window_hours: 24,
        }
    }
}

impl TirConfig {
    /// Default trailing window
    pub fn default_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.default_window_hours))
    }
}

/// Remote bucket service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9107".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl RemoteConfig {
    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of the compact format
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ServiceConfig {
    /// Defaults plus `TIDEX_*` environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup, then validate
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("TIDEX_LISTEN_ADDR") {
            self.http.listen_addr = addr;
        }
        if let Some(limit) = parse_var(&lookup, "TIDEX_BODY_LIMIT")? {
            self.http.body_limit_bytes = limit;
        }
        if let Some(types) = lookup("TIDEX_EXCLUDED_TYPES") {
            self.export.exclude_types = split_list(&types).map(str::to_string).collect();
        }
        if let Some(levels) = lookup("TIDEX_PARAMETER_LEVELS") {
            self.export.parameter_levels = split_list(&levels)
                .map(|level| parse_value("TIDEX_PARAMETER_LEVELS", level))
                .collect::<Result<_, _>>()?;
        }
        if let Some(ratio) = parse_var(&lookup, "TIDEX_GROW_RATIO")? {
            self.export.bytes_per_second = ratio;
        }
        if let Some(limit) = parse_var(&lookup, "TIDEX_MAX_GROW_BYTES")? {
            self.export.max_grow_bytes = limit;
        }
        if let Some(url) = lookup("TIDEX_REMOTE_URL") {
            self.remote.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(timeout) = parse_var(&lookup, "TIDEX_REMOTE_TIMEOUT_MS")? {
            self.remote.timeout_ms = timeout;
        }
        if let Some(v) = parse_var(&lookup, "TIDEX_TIR_VERY_LOW")? {
            self.tir.thresholds.very_low = v;
        }
        if let Some(v) = parse_var(&lookup, "TIDEX_TIR_LOW")? {
            self.tir.thresholds.low = v;
        }
        if let Some(v) = parse_var(&lookup, "TIDEX_TIR_HIGH")? {
            self.tir.thresholds.high = v;
        }
        if let Some(v) = parse_var(&lookup, "TIDEX_TIR_VERY_HIGH")? {
            self.tir.thresholds.very_high = v;
        }
        if let Some(minutes) = parse_var(&lookup, "TIDEX_TIR_INTERVAL_MINUTES")? {
            self.tir.sampling_interval_minutes = minutes;
        }
        if let Some(hours) = parse_var(&lookup, "TIDEX_TIR_WINDOW_HOURS")? {
            self.tir.default_window_hours = hours;
        }
        if let Some(level) = lookup("TIDEX_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_var(&lookup, "TIDEX_LOG_JSON")? {
            self.logging.json = json;
        }

        self.validate()?;
        info!(
            listen_addr = %self.http.listen_addr,
            remote = %self.remote.base_url,
            "configuration loaded"
        );
        Ok(self)
    }

    /// Override the listen address
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.http.listen_addr = addr.into();
        self
    }

    /// Override the remote service base URL
    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote.base_url = url.into();
        self
    }

    /// Override the excluded types
    pub fn with_excluded_types(mut self, types: Vec<String>) -> Self {
        self.export.exclude_types = types;
        self
    }

    /// Override the device parameter level allow-list
    pub fn with_parameter_levels(mut self, levels: Vec<i64>) -> Self {
        self.export.parameter_levels = levels;
        self
    }

    /// Override TIR thresholds
    pub fn with_tir_thresholds(mut self, thresholds: TirThresholds) -> Self {
        self.tir.thresholds = thresholds;
        self
    }

    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.http
            .listen_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                key: "TIDEX_LISTEN_ADDR",
                value: self.http.listen_addr.clone(),
                reason: e.to_string(),
            })
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;

        if self.export.parameter_levels.is_empty() {
            return Err(ConfigError::Invalid(
                "parameter level allow-list must not be empty".to_string(),
            ));
        }
        if !(self.export.bytes_per_second.is_finite() && self.export.bytes_per_second > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "grow ratio must be positive, got {}",
                self.export.bytes_per_second
            )));
        }
        if self.export.max_grow_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max grow bytes must be positive".to_string(),
            ));
        }
        if !self.tir.thresholds.is_ordered() {
            return Err(ConfigError::Invalid(
                "TIR thresholds must satisfy veryLow < low < high < veryHigh".to_string(),
            ));
        }
        if self.tir.sampling_interval_minutes == 0 || self.tir.default_window_hours == 0 {
            return Err(ConfigError::Invalid(
                "TIR interval and window must be positive".to_string(),
            ));
        }
        if !self.remote.base_url.starts_with("http://") && !self.remote.base_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid(format!(
                "remote base URL must be http(s), got '{}'",
                self.remote.base_url
            )));
        }
        Ok(())
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|raw| parse_value(key, &raw)).transpose()
}
