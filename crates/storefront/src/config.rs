//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 8080)
//! - `STOREFRONT_BASE_URL` - Public URL of this service (default: `http://localhost:8080`)
//! - `MCO_URL` - Base URL of the recommendation service (suggestions disabled if unset)
//! - `MCO_APP_NAME` - Agent application name sent to the MCO (default: `multi_tool_agent`)
//! - `MCO_TIMEOUT_SECS` - Outbound request timeout (default: 5)
//! - `MONITORING_URL` - Base URL of the cart-change monitoring relay
//! - `MONITORING_TIMEOUT_SECS` - Relay request timeout (default: 5)
//! - `SUGGESTION_THRESHOLD` - Distinct cart items above which a refresh fires (default: 3)
//! - `SUGGESTION_WORKERS` - Background worker count (default: 2)
//! - `SUGGESTION_QUEUE_CAPACITY` - Background queue capacity (default: 64)
//! - `SUGGESTION_CACHE_TTL_SECS` - Stored-suggestion cache TTL (default: 300)
//! - `SHUTDOWN_GRACE_SECS` - Time allowed for background jobs to drain (default: 10)
//! - `LOG_FORMAT` - `text` or `json` (default: text)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Storefront application configuration.
///
/// Implements `Debug` manually to redact the database URL.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of this service
    pub base_url: Url,
    /// Recommendation service settings
    pub mco: McoConfig,
    /// Cart-change monitoring relay settings
    pub monitoring: MonitoringConfig,
    /// Suggestion refresh and background worker settings
    pub suggestions: SuggestionConfig,
    /// How long shutdown waits for in-flight background jobs
    pub shutdown_grace: Duration,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production", "staging")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry transaction sample rate
    pub sentry_traces_sample_rate: f32,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url.as_str())
            .field("mco", &self.mco)
            .field("monitoring", &self.monitoring)
            .field("suggestions", &self.suggestions)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("log_format", &self.log_format)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

/// Recommendation service (MCO) configuration.
#[derive(Debug, Clone)]
pub struct McoConfig {
    /// Base URL; `None` disables suggestion refreshes.
    pub base_url: Option<Url>,
    /// Agent application name placed in the request envelope.
    pub app_name: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for McoConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            app_name: DEFAULT_MCO_APP_NAME.to_string(),
            timeout: Duration::from_secs(DEFAULT_MCO_TIMEOUT_SECS),
        }
    }
}

/// Cart-change monitoring relay configuration.
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    /// Base URL; `None` disables notifications.
    pub base_url: Option<Url>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(DEFAULT_MONITORING_TIMEOUT_SECS),
        }
    }
}

/// Suggestion refresh configuration.
#[derive(Debug, Clone)]
pub struct SuggestionConfig {
    /// A refresh fires when the cart holds more than this many distinct products.
    pub threshold: usize,
    /// Number of background workers.
    pub workers: usize,
    /// Bounded background queue capacity.
    pub queue_capacity: usize,
    /// TTL of the in-memory stored-suggestion cache.
    pub cache_ttl: Duration,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SUGGESTION_THRESHOLD,
            workers: DEFAULT_SUGGESTION_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

const DEFAULT_MCO_APP_NAME: &str = "multi_tool_agent";
const DEFAULT_MCO_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MONITORING_TIMEOUT_SECS: u64 = 5;
const DEFAULT_SUGGESTION_THRESHOLD: usize = 3;
const DEFAULT_SUGGESTION_WORKERS: usize = 2;
const DEFAULT_QUEUE_CAPACITY: usize = 64;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or any value
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env_or_default("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default("STOREFRONT_PORT", "8080")?;
        let base_url = parse_url(
            "STOREFRONT_BASE_URL",
            &get_env_or_default("STOREFRONT_BASE_URL", "http://localhost:8080"),
        )?;

        let mco = McoConfig::from_env()?;
        let monitoring = MonitoringConfig::from_env()?;
        let suggestions = SuggestionConfig::from_env()?;
        let shutdown_grace = Duration::from_secs(parse_env_or_default(
            "SHUTDOWN_GRACE_SECS",
            &DEFAULT_SHUTDOWN_GRACE_SECS.to_string(),
        )?);
        let log_format = parse_env_or_default("LOG_FORMAT", "text")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            mco,
            monitoring,
            suggestions,
            shutdown_grace,
            log_format,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl McoConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: get_optional_url("MCO_URL")?,
            app_name: get_env_or_default("MCO_APP_NAME", DEFAULT_MCO_APP_NAME),
            timeout: Duration::from_secs(parse_env_or_default(
                "MCO_TIMEOUT_SECS",
                &DEFAULT_MCO_TIMEOUT_SECS.to_string(),
            )?),
        })
    }
}

impl MonitoringConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: get_optional_url("MONITORING_URL")?,
            timeout: Duration::from_secs(parse_env_or_default(
                "MONITORING_TIMEOUT_SECS",
                &DEFAULT_MONITORING_TIMEOUT_SECS.to_string(),
            )?),
        })
    }
}

impl SuggestionConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let workers: usize = parse_env_or_default(
            "SUGGESTION_WORKERS",
            &DEFAULT_SUGGESTION_WORKERS.to_string(),
        )?;
        let queue_capacity: usize = parse_env_or_default(
            "SUGGESTION_QUEUE_CAPACITY",
            &DEFAULT_QUEUE_CAPACITY.to_string(),
        )?;
        if workers == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SUGGESTION_WORKERS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        if queue_capacity == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SUGGESTION_QUEUE_CAPACITY".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            threshold: parse_env_or_default(
                "SUGGESTION_THRESHOLD",
                &DEFAULT_SUGGESTION_THRESHOLD.to_string(),
            )?,
            workers,
            queue_capacity,
            cache_ttl: Duration::from_secs(parse_env_or_default(
                "SUGGESTION_CACHE_TTL_SECS",
                &DEFAULT_CACHE_TTL_SECS.to_string(),
            )?),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse an optional URL variable.
fn get_optional_url(key: &str) -> Result<Option<Url>, ConfigError> {
    get_optional_env(key)
        .map(|value| parse_url(key, &value))
        .transpose()
}

/// Parse a base URL, requiring an http(s) scheme.
fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Join a path onto a base URL, tolerating a trailing slash on the base.
///
/// `Url::join` drops the last path segment of a base without a trailing
/// slash, so the base is normalised first.
///
/// # Errors
///
/// Returns `url::ParseError` if the joined URL is invalid.
pub fn join_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
}
