//! mTLS gRPC connection to the product-info service.
//!
//! [`Endpoint::connect`] opens an HTTP/2 channel and completes the TLS
//! handshake before returning. Every call made through the resulting
//! [`ProductInfoClient`] is its own HTTP/2 stream, carries the endpoint's
//! credentials, and announces its deadline to the service in `grpc-timeout`.
//! The deadline is also enforced locally, so a silent service surfaces as
//! `DeadlineExceeded` rather than a hang.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use common::protocol::{Method, Product, ProductId};
use common::Status;
use thiserror::Error;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::{InvalidUri, PathAndQuery};
use tonic::codegen::InterceptedService;
use tonic::transport::{Channel, ClientTlsConfig};
use tracing::{debug, info};

use crate::credentials::{CallCredentials, CredentialCarrier};

/// Default per-call deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors establishing a connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid service address {addr:?}: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: InvalidUri,
    },

    /// The service could not be reached, or the TLS handshake failed: the
    /// service certificate did not verify against the CA bundle or the
    /// expected name, or the service rejected this client's certificate.
    #[error("cannot connect to {addr}: {source}")]
    Transport {
        addr: String,
        #[source]
        source: tonic::transport::Error,
    },
}

/// Where and how to connect.
pub struct Endpoint {
    addr: String,
    tls: ClientTlsConfig,
    credentials: Option<Arc<dyn CallCredentials>>,
    timeout: Duration,
}

impl Endpoint {
    /// Target `addr` (`host:port`) with the given client TLS configuration.
    ///
    /// The configuration fixes the CA bundle, the client certificate and the
    /// name the service certificate must carry.
    pub fn new(addr: impl Into<String>, tls: ClientTlsConfig) -> Self {
        Self {
            addr: addr.into(),
            tls,
            credentials: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Attach `credentials` to every call made on the connection.
    pub fn credentials(mut self, credentials: impl CallCredentials + 'static) -> Self {
        self.credentials = Some(Arc::new(credentials));
        self
    }

    /// Per-call deadline. Sent to the service and enforced locally.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Open the connection.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::Transport`] if the service is unreachable or
    /// either side rejects the other's certificate. This is never retried.
    pub async fn connect(self) -> Result<ProductInfoClient, ConnectError> {
        let channel = Channel::from_shared(format!("https://{}", self.addr))
            .map_err(|source| ConnectError::InvalidAddress {
                addr: self.addr.clone(),
                source,
            })?
            .tls_config(self.tls)
            .map_err(|source| ConnectError::Transport {
                addr: self.addr.clone(),
                source,
            })?
            .connect()
            .await
            .map_err(|source| ConnectError::Transport {
                addr: self.addr.clone(),
                source,
            })?;
        info!(addr = %self.addr, "connected");

        Ok(ProductInfoClient::new(
            channel,
            self.credentials,
            self.timeout,
        ))
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("addr", &self.addr)
            .field("credentials", &self.credentials.is_some())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// An open connection to the product-info service.
///
/// Cheap to clone; clones share the underlying channel and may issue calls
/// concurrently.
#[derive(Clone)]
pub struct ProductInfoClient {
    inner: tonic::client::Grpc<InterceptedService<Channel, CredentialCarrier>>,
    timeout: Duration,
}

impl ProductInfoClient {
    /// Wrap an already established `channel`.
    pub fn new(
        channel: Channel,
        credentials: Option<Arc<dyn CallCredentials>>,
        timeout: Duration,
    ) -> Self {
        let service = InterceptedService::new(channel, CredentialCarrier::new(credentials));
        Self {
            inner: tonic::client::Grpc::new(service),
            timeout,
        }
    }

    /// Store a product and return its new id.
    pub async fn add_product(&self, product: Product) -> Result<ProductId, Status> {
        self.unary(Method::AddProduct, product).await
    }

    /// Fetch a stored product.
    pub async fn get_product(&self, id: ProductId) -> Result<Product, Status> {
        self.unary(Method::GetProduct, id).await
    }

    /// Send one request and wait for its outcome.
    ///
    /// Fails with `DeadlineExceeded` if no reply arrives within the configured
    /// timeout.
    async fn unary<M, R>(&self, method: Method, message: M) -> Result<R, Status>
    where
        M: prost::Message + Send + Sync + 'static,
        R: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.inner.clone();
        let mut request = tonic::Request::new(message);
        request.set_timeout(self.timeout);

        let call = async move {
            grpc.ready()
                .await
                .map_err(|e| Status::unavailable(format!("service not ready: {e}")))?;
            grpc.unary(
                request,
                PathAndQuery::from_static(method.path()),
                ProstCodec::<M, R>::default(),
            )
            .await
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(outcome) => outcome.map(tonic::Response::into_inner),
            Err(_) => {
                debug!(%method, "no reply before deadline");
                Err(Status::deadline_exceeded("deadline exceeded"))
            }
        }
    }
}

impl fmt::Debug for ProductInfoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProductInfoClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use common::Code;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use super::*;
    use crate::credentials::BearerToken;

    #[tokio::test]
    async fn silent_service_hits_deadline() {
        // Accepts TCP and reads whatever arrives, but never speaks HTTP/2.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
        });

        let channel = Channel::from_shared(format!("http://{addr}"))
            .unwrap()
            .connect_lazy();
        let client = ProductInfoClient::new(
            channel,
            Some(Arc::new(BearerToken::new("tok"))),
            Duration::from_millis(100),
        );

        let status = client.get_product(ProductId::new("x")).await.unwrap_err();
        assert_eq!(status.code(), Code::DeadlineExceeded);
    }

    #[tokio::test]
    async fn malformed_address_is_rejected_before_connecting() {
        let err = Endpoint::new("not a host:port", ClientTlsConfig::new())
            .connect()
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        common::tls::install_crypto_provider();
        let err = Endpoint::new(addr.to_string(), ClientTlsConfig::new())
            .connect()
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::Transport { .. }));
    }

    #[test]
    fn debug_hides_credentials() {
        let endpoint = Endpoint::new("localhost:50051", ClientTlsConfig::new())
            .credentials(BearerToken::new("secret"));
        let dbg = format!("{endpoint:?}");
        assert!(dbg.contains("localhost:50051"));
        assert!(!dbg.contains("secret"));
    }
}
