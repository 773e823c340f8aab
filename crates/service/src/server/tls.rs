//! Mutual-TLS identity loading.
//!
//! The service certificate, its key and the CA bundle that client
//! certificates must chain to are read from the paths in [`Config`]. Any
//! failure here is fatal at startup.

use anyhow::{Context, Result};
use common::tls::IdentityMaterial;

use crate::config::Config;

/// Load the service identity from the configured PEM files.
///
/// # Errors
///
/// Returns an error if any file cannot be read or parsed.
pub fn load_identity(cfg: &Config) -> Result<IdentityMaterial> {
    IdentityMaterial::load(&cfg.tls_cert_path, &cfg.tls_key_path, &cfg.tls_ca_path)
        .context("failed to load service TLS identity")
}
