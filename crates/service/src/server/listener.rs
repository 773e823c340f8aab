//! mTLS gRPC listener.
//!
//! Connections are served by tonic over HTTP/2:
//! 1. The TLS handshake requires a client certificate issued by the
//!    configured CA. A client without one is dropped before any call is read.
//! 2. Every call is its own HTTP/2 stream, so a call that fails to decode or
//!    to run affects only that call.
//! 3. At most [`CallLimits::max_concurrent_per_connection`] calls of one
//!    connection are in flight; further calls on that connection wait.

use std::future::Future;
use std::net::SocketAddr;

use anyhow::{anyhow, Context, Result};
use tokio::net::TcpListener;
use tonic::transport::server::TcpIncoming;
use tonic::transport::{Server as TransportServer, ServerTlsConfig};
use tracing::info;

use super::grpc::ProductInfoServer;
use super::middleware::CallLimits;
use crate::interceptor::InterceptorChain;

/// A bound, not yet serving, mTLS listener.
pub struct Server {
    listener: TcpListener,
    tls: ServerTlsConfig,
    service: ProductInfoServer,
    max_concurrent_calls_per_connection: usize,
}

impl Server {
    /// Bind the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(
        addr: &str,
        tls: ServerTlsConfig,
        chain: InterceptorChain,
        limits: CallLimits,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        Ok(Self {
            listener,
            tls,
            service: ProductInfoServer::new(chain, limits.default_timeout),
            max_concurrent_calls_per_connection: limits.max_concurrent_per_connection,
        })
    }

    /// Address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` resolves, then drain open connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS configuration is rejected or the transport
    /// fails.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            addr = ?self.listener.local_addr().ok(),
            links = ?self.service.link_names(),
            max_concurrent_calls_per_connection = self.max_concurrent_calls_per_connection,
            "productinfo-service listening"
        );

        let incoming = TcpIncoming::from_listener(self.listener, true, None)
            .map_err(|e| anyhow!("failed to configure listener: {e}"))?;

        TransportServer::builder()
            .tls_config(self.tls)
            .context("invalid server TLS configuration")?
            .concurrency_limit_per_connection(self.max_concurrent_calls_per_connection)
            .add_service(self.service)
            .serve_with_incoming_shutdown(incoming, async {
                shutdown.await;
                info!("shutdown signal received; no longer accepting connections");
            })
            .await
            .context("transport error")?;
        Ok(())
    }
}
