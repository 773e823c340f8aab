//! Mutual-TLS setup for the gRPC transport.
//!
//! Both roles load an [`IdentityMaterial`] (certificate chain, private key and
//! CA bundle) from PEM. The material is checked with rustls at load time and
//! then handed to tonic's TLS configuration:
//! - the service requires and verifies a client certificate chaining to the CA;
//! - the client verifies the service certificate against the CA and the
//!   expected server name, and presents its own certificate.
//!
//! There is no fallback to one-way TLS. Any parse or configuration error is
//! returned to the caller, which treats it as fatal at startup.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rustls::pki_types::{CertificateDer, ServerName};
use rustls::RootCertStore;
use thiserror::Error;
use tonic::transport::{Certificate, ClientTlsConfig, Identity, ServerTlsConfig};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::FromDer;

/// Errors produced while loading identity material or building TLS configs.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {what}: {source}")]
    Pem {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("no {0} found in PEM data")]
    Missing(&'static str),

    #[error("failed to add CA certificate to trust store: {0}")]
    TrustStore(#[source] rustls::Error),

    #[error("invalid server name {0:?}")]
    ServerName(String),

    #[error("failed to parse peer certificate: {0}")]
    PeerCertificate(String),
}

/// Certificate chain, private key and trusted roots for one role.
///
/// Immutable after load. Only used to build a tonic TLS configuration.
pub struct IdentityMaterial {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
    ca_pem: Vec<u8>,
    chain_len: usize,
    roots: usize,
}

impl IdentityMaterial {
    /// Load identity material from three PEM files.
    ///
    /// # Errors
    ///
    /// Returns an error if any file cannot be read or parsed.
    pub fn load(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        ca_path: impl AsRef<Path>,
    ) -> Result<Self, TlsError> {
        let cert_pem = read_file(cert_path.as_ref())?;
        let key_pem = read_file(key_path.as_ref())?;
        let ca_pem = read_file(ca_path.as_ref())?;
        Self::from_pem(&cert_pem, &key_pem, &ca_pem)
    }

    /// Build identity material from PEM-encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate chain, key or CA bundle cannot be
    /// parsed, or if any of them is empty.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8], ca_pem: &[u8]) -> Result<Self, TlsError> {
        let chain_len = parse_certs(cert_pem, "certificate chain")?.len();

        rustls_pemfile::private_key(&mut std::io::BufReader::new(key_pem))
            .map_err(|source| TlsError::Pem {
                what: "private key",
                source,
            })?
            .ok_or(TlsError::Missing("private key"))?;

        let mut roots = RootCertStore::empty();
        for ca in parse_certs(ca_pem, "CA bundle")? {
            roots.add(ca).map_err(TlsError::TrustStore)?;
        }

        Ok(Self {
            cert_pem: cert_pem.to_vec(),
            key_pem: key_pem.to_vec(),
            ca_pem: ca_pem.to_vec(),
            chain_len,
            roots: roots.len(),
        })
    }

    /// Service-side configuration.
    ///
    /// Every connecting client must present a certificate that chains to the
    /// CA bundle; the handshake fails otherwise.
    pub fn server_tls_config(&self) -> ServerTlsConfig {
        install_crypto_provider();
        ServerTlsConfig::new()
            .identity(self.identity())
            .client_ca_root(Certificate::from_pem(&self.ca_pem))
            .client_auth_optional(false)
    }

    /// Client-side configuration expecting the service certificate to be
    /// valid for `server_name`.
    ///
    /// # Errors
    ///
    /// Returns [`TlsError::ServerName`] if `server_name` is neither a DNS
    /// name nor an IP address.
    pub fn client_tls_config(&self, server_name: &str) -> Result<ClientTlsConfig, TlsError> {
        validate_server_name(server_name)?;
        install_crypto_provider();
        Ok(ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(&self.ca_pem))
            .identity(self.identity())
            .domain_name(server_name))
    }

    fn identity(&self) -> Identity {
        Identity::from_pem(&self.cert_pem, &self.key_pem)
    }
}

impl fmt::Debug for IdentityMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        f.debug_struct("IdentityMaterial")
            .field("cert_chain_len", &self.chain_len)
            .field("key", &"[REDACTED]")
            .field("roots", &self.roots)
            .finish()
    }
}

/// Make ring the process-wide rustls provider.
///
/// tonic builds its rustls configs from the process default. Calling this more
/// than once is harmless.
pub fn install_crypto_provider() {
    // Err means a provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Check the name the client expects the service certificate to carry.
///
/// # Errors
///
/// Returns [`TlsError::ServerName`] if `name` is neither a DNS name nor an IP
/// address.
pub fn validate_server_name(name: &str) -> Result<(), TlsError> {
    ServerName::try_from(name)
        .map(|_| ())
        .map_err(|_| TlsError::ServerName(name.to_owned()))
}

/// Identity fields of a verified peer certificate, for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerIdentity {
    /// Subject Common Name.
    pub common_name: Option<String>,
    /// Subject Alternative Name DNS entries.
    pub dns_names: Vec<String>,
}

impl PeerIdentity {
    /// Parse the leaf certificate of a verified peer.
    ///
    /// # Errors
    ///
    /// Returns [`TlsError::PeerCertificate`] if the DER cannot be parsed.
    pub fn from_der(der: &[u8]) -> Result<Self, TlsError> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| TlsError::PeerCertificate(e.to_string()))?;

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_owned);

        let mut dns_names = Vec::new();
        if let Ok(Some(san)) = cert.subject_alternative_name() {
            for name in &san.value.general_names {
                if let GeneralName::DNSName(dns) = name {
                    dns_names.push((*dns).to_owned());
                }
            }
        }

        Ok(Self {
            common_name,
            dns_names,
        })
    }

    /// Label used in logs: CN, else first DNS SAN, else `<unknown>`.
    pub fn display_name(&self) -> &str {
        self.common_name
            .as_deref()
            .or_else(|| self.dns_names.first().map(String::as_str))
            .unwrap_or("<unknown>")
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, TlsError> {
    fs::read(path).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_certs(pem: &[u8], what: &'static str) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = rustls_pemfile::certs(&mut std::io::BufReader::new(pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Pem { what, source })?;
    if certs.is_empty() {
        return Err(TlsError::Missing(what));
    }
    Ok(certs)
}
