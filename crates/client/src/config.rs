//! Configuration loading and validation for the product-info client.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Validated client configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// `host:port` of the service.
    #[serde(default = "default_server_addr")]
    pub server_addr: String,

    /// Name the service certificate must carry.
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Path to the PEM-encoded client certificate chain. **Required.**
    pub tls_cert_path: String,

    /// Path to the PEM-encoded client private key. **Required.**
    pub tls_key_path: String,

    /// Path to the PEM-encoded CA bundle used to verify the service. **Required.**
    pub tls_ca_path: String,

    /// Bearer token attached to every call. **Required.**
    pub auth_token: String,

    /// Per-call deadline.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    #[serde(default = "default_product_name")]
    pub product_name: String,

    #[serde(default = "default_product_description")]
    pub product_description: String,

    #[serde(default = "default_product_price")]
    pub product_price: f32,

    /// Tracing log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_server_addr() -> String {
    "localhost:50051".into()
}
fn default_server_name() -> String {
    "localhost".into()
}
fn default_call_timeout_ms() -> u64 {
    1000
}
fn default_product_name() -> String {
    "Sumsung S9999".into()
}
fn default_product_description() -> String {
    "Samsung Galaxy S9999 is the latest smart phone, launched in February 2039".into()
}
fn default_product_price() -> f32 {
    7777.0
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build client configuration")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise client configuration")?;

        c.validate()?;
        Ok(c)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        for (value, name) in [
            (&self.server_addr, "SERVER_ADDR"),
            (&self.server_name, "SERVER_NAME"),
            (&self.tls_cert_path, "TLS_CERT_PATH"),
            (&self.tls_key_path, "TLS_KEY_PATH"),
            (&self.tls_ca_path, "TLS_CA_PATH"),
            (&self.auth_token, "AUTH_TOKEN"),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{name} is required and must not be empty");
            }
        }
        if self.call_timeout_ms == 0 {
            anyhow::bail!("CALL_TIMEOUT_MS must be > 0");
        }
        if !self.product_price.is_finite() {
            anyhow::bail!("PRODUCT_PRICE must be a finite number");
        }
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_addr", &self.server_addr)
            .field("server_name", &self.server_name)
            .field("tls_cert_path", &self.tls_cert_path)
            .field("tls_key_path", &self.tls_key_path)
            .field("tls_ca_path", &self.tls_ca_path)
            .field("auth_token", &"[REDACTED]")
            .field("call_timeout_ms", &self.call_timeout_ms)
            .field("product_name", &self.product_name)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}
