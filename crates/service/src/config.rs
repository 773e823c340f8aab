//! Configuration loading and validation for the product-info service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::server::middleware::CallLimits;

/// Validated service configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Address the mTLS listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path to the PEM-encoded service certificate chain. **Required.**
    pub tls_cert_path: String,

    /// Path to the PEM-encoded service private key. **Required.**
    pub tls_key_path: String,

    /// Path to the PEM-encoded CA bundle client certificates must chain to.
    /// **Required.**
    pub tls_ca_path: String,

    /// Bearer token every call must present. **Required.**
    pub auth_token: String,

    /// Deadline applied to calls that do not carry their own timeout.
    #[serde(default = "default_call_timeout_ms")]
    pub default_call_timeout_ms: u64,

    /// Calls one connection may have in flight; further calls queue.
    #[serde(default = "default_max_concurrent_calls_per_connection")]
    pub max_concurrent_calls_per_connection: usize,

    /// Optional OTLP endpoint. Spans are only exported when this is set.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:50051".into()
}
fn default_call_timeout_ms() -> u64 {
    30_000
}
fn default_max_concurrent_calls_per_connection() -> usize {
    64
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Deadline applied when a call carries no timeout of its own.
    pub fn default_call_timeout(&self) -> Duration {
        Duration::from_millis(self.default_call_timeout_ms)
    }

    /// Deadline and concurrency limits for the listener.
    pub fn call_limits(&self) -> CallLimits {
        CallLimits {
            default_timeout: self.default_call_timeout(),
            max_concurrent_per_connection: self.max_concurrent_calls_per_connection,
        }
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.listen_addr, "LISTEN_ADDR")?;
        ensure_non_empty(&self.tls_cert_path, "TLS_CERT_PATH")?;
        ensure_non_empty(&self.tls_key_path, "TLS_KEY_PATH")?;
        ensure_non_empty(&self.tls_ca_path, "TLS_CA_PATH")?;
        ensure_non_empty(&self.auth_token, "AUTH_TOKEN")?;

        if self.default_call_timeout_ms == 0 {
            anyhow::bail!("DEFAULT_CALL_TIMEOUT_MS must be > 0");
        }
        if self.max_concurrent_calls_per_connection == 0 {
            anyhow::bail!("MAX_CONCURRENT_CALLS_PER_CONNECTION must be > 0");
        }
        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            ensure_non_empty(endpoint, "OTEL_EXPORTER_OTLP_ENDPOINT")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("tls_cert_path", &self.tls_cert_path)
            .field("tls_key_path", &self.tls_key_path)
            .field("tls_ca_path", &self.tls_ca_path)
            .field("auth_token", &"[REDACTED]")
            .field("default_call_timeout_ms", &self.default_call_timeout_ms)
            .field(
                "max_concurrent_calls_per_connection",
                &self.max_concurrent_calls_per_connection,
            )
            .field("otel_exporter_otlp_endpoint", &self.otel_exporter_otlp_endpoint)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
