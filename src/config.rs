//! Configuration loading and types for presigner.
//!
//! Configuration is read from an optional YAML file and deserialized into
//! the [`Config`] struct, then overlaid with environment variables. It is
//! built once at startup and shared read-only with every request.
//!
//! Storage settings are allowed to be incomplete at load time; presence is
//! checked per request by [`StorageConfig::upload_target`], so a missing
//! credential surfaces as a request failure rather than a crash loop.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::presign::{Endpoint, Scheme, UploadTarget};

/// Longest validity window SigV4 accepts for a presigned URL (7 days).
pub const MAX_EXPIRY_SECONDS: u64 = 604_800;

/// Environment variable names, in the order they are reported when missing.
pub const ENV_ENDPOINT: &str = "MINIO_ENDPOINT";
pub const ENV_BUCKET: &str = "MINIO_BUCKET";
pub const ENV_ACCESS_KEY: &str = "MINIO_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "MINIO_SECRET_KEY";
pub const ENV_USE_SSL: &str = "MINIO_USE_SSL";
pub const ENV_PORT: &str = "MINIO_PORT";
pub const ENV_REGION: &str = "MINIO_REGION";
pub const ENV_EXPIRY_SECONDS: &str = "EXPIRY_SECONDS";
pub const ENV_CORS_ORIGIN: &str = "CORS_ORIGIN";

/// Configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required values are absent.
    #[error("Missing required environment variables: {}", .missing.join(", "))]
    Missing { missing: Vec<&'static str> },

    /// A value is present but unusable.
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Object store endpoint and credentials.
    #[serde(default)]
    pub storage: StorageConfig,

    /// CORS settings.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Object store settings.
///
/// Each field maps to one environment variable (see the `ENV_*` constants),
/// which takes precedence over the YAML value when set and non-empty.
#[derive(Clone, Deserialize)]
pub struct StorageConfig {
    /// Endpoint host, without scheme or port (`MINIO_ENDPOINT`).
    #[serde(default)]
    pub endpoint: String,

    /// Bucket uploads go into (`MINIO_BUCKET`).
    #[serde(default)]
    pub bucket: String,

    /// Access key ID (`MINIO_ACCESS_KEY`).
    #[serde(alias = "access_key_id", default)]
    pub access_key: String,

    /// Secret access key (`MINIO_SECRET_KEY`).
    #[serde(alias = "secret_access_key", default)]
    pub secret_key: String,

    /// Use https (`MINIO_USE_SSL`).
    #[serde(default)]
    pub use_ssl: bool,

    /// Explicit endpoint port (`MINIO_PORT`).
    #[serde(default)]
    pub port: Option<u16>,

    /// Signing region (`MINIO_REGION`).
    #[serde(default = "default_region")]
    pub region: String,

    /// Validity window of issued URLs in seconds (`EXPIRY_SECONDS`).
    #[serde(default = "default_expiry_seconds")]
    pub expiry_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            bucket: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            use_ssl: false,
            port: None,
            region: default_region(),
            expiry_seconds: default_expiry_seconds(),
        }
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("use_ssl", &self.use_ssl)
            .field("port", &self.port)
            .field("region", &self.region)
            .field("expiry_seconds", &self.expiry_seconds)
            .finish()
    }
}

impl StorageConfig {
    /// Names of required settings that are empty.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (ENV_ENDPOINT, &self.endpoint),
            (ENV_BUCKET, &self.bucket),
            (ENV_ACCESS_KEY, &self.access_key),
            (ENV_SECRET_KEY, &self.secret_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Validate presence and ranges, and build the signing target.
    pub fn upload_target(&self) -> Result<UploadTarget, ConfigError> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(ConfigError::Missing { missing });
        }
        if self.expiry_seconds == 0 || self.expiry_seconds > MAX_EXPIRY_SECONDS {
            return Err(ConfigError::Invalid {
                name: ENV_EXPIRY_SECONDS,
                reason: format!("must be between 1 and {MAX_EXPIRY_SECONDS}"),
            });
        }
        let region = if self.region.trim().is_empty() {
            default_region()
        } else {
            self.region.clone()
        };

        Ok(UploadTarget {
            endpoint: Endpoint {
                scheme: Scheme::from_tls(self.use_ssl),
                host: self.endpoint.clone(),
                port: self.port,
            },
            bucket: self.bucket.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            region,
            expires_in: self.expiry_seconds,
        })
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Value of `Access-Control-Allow-Origin` (`CORS_ORIGIN`).
    #[serde(default = "default_cors_origin")]
    pub origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origin: default_cors_origin(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and the `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { metrics: true }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_expiry_seconds() -> u64 {
    300
}

fn default_cors_origin() -> String {
    "*".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Environment overlay -----------------------------------------------------

impl Config {
    /// Overlay values from `lookup` (normally the process environment).
    ///
    /// Empty values count as unset. `EXPIRY_SECONDS` keeps its leading
    /// digits (`"12.5"` is 12) and falls back to the default window when
    /// none remain or they are zero. An unparsable `MINIO_PORT` is an error
    /// since guessing a port would sign for the wrong host.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(v) = get(ENV_ENDPOINT) {
            self.storage.endpoint = v;
        }
        if let Some(v) = get(ENV_BUCKET) {
            self.storage.bucket = v;
        }
        if let Some(v) = get(ENV_ACCESS_KEY) {
            self.storage.access_key = v;
        }
        if let Some(v) = get(ENV_SECRET_KEY) {
            self.storage.secret_key = v;
        }
        if let Some(v) = get(ENV_USE_SSL) {
            self.storage.use_ssl = v == "true";
        }
        if let Some(v) = get(ENV_PORT) {
            let port = v.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: ENV_PORT,
                reason: e.to_string(),
            })?;
            self.storage.port = Some(port);
        }
        if let Some(v) = get(ENV_REGION) {
            self.storage.region = v;
        }
        if let Some(v) = get(ENV_EXPIRY_SECONDS) {
            self.storage.expiry_seconds =
                leading_seconds(&v).unwrap_or_else(default_expiry_seconds);
        }
        if let Some(v) = get(ENV_CORS_ORIGIN) {
            self.cors.origin = v;
        }
        Ok(())
    }
}

/// Positive integer formed by the leading digits of `raw`.
fn leading_seconds(raw: &str) -> Option<u64> {
    let trimmed = raw.trim_start();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<u64>().ok().filter(|secs| *secs > 0)
}

// -- Loader ------------------------------------------------------------------

/// Parse configuration from YAML text.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
}

/// Load configuration from an optional YAML file at `path`, then overlay
/// the process environment.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> anyhow::Result<Config> {
    load_config_with(path, |name| std::env::var(name).ok())
}

/// [`load_config`] with an explicit variable lookup in place of the process
/// environment.
pub fn load_config_with<P, F>(path: Option<P>, lookup: F) -> anyhow::Result<Config>
where
    P: AsRef<Path>,
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path.as_ref())?;
            parse_config(&contents)?
        }
        None => Config::default(),
    };
    config.apply_env(lookup)?;
    Ok(config)
}
