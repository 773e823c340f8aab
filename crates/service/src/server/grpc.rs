//! `ecommerce.ProductInfo` as a tower service.
//!
//! Requests are routed by HTTP/2 path and decoded with [`ProductInfoCodec`].
//! Each call then gets a [`CallContext`] (metadata, deadline, verified peer)
//! and runs through the [`InterceptorChain`] on its own task, so the chain
//! reaches its own deadline and reports an outcome even if the transport
//! gives up on the call first.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use common::codec::ProductInfoCodec;
use common::protocol::{Method, Product, ProductId, Reply, Request, SERVICE_NAME};
use common::tls::PeerIdentity;
use tokio::time::Instant;
use tonic::body::BoxBody;
use tonic::codegen::{empty_body, http, Body, BoxFuture, Service, StdError};
use tonic::server::{Grpc, NamedService, UnaryService};
use tonic::{Code, Status};
use tracing::{error, info_span, warn, Instrument};

use super::context::CallContext;
use super::middleware::{self, GRPC_TIMEOUT};
use crate::interceptor::{CallResult, InterceptorChain};

/// Routes `ecommerce.ProductInfo` calls into an [`InterceptorChain`].
///
/// Cheap to clone; clones share the chain and the call id counter.
#[derive(Clone)]
pub struct ProductInfoServer {
    inner: Arc<Inner>,
}

struct Inner {
    chain: InterceptorChain,
    default_call_timeout: Duration,
    next_call_id: AtomicU64,
}

impl ProductInfoServer {
    pub fn new(chain: InterceptorChain, default_call_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                chain,
                default_call_timeout,
                next_call_id: AtomicU64::new(1),
            }),
        }
    }

    /// Link names of the wrapped chain, in invocation order.
    pub fn link_names(&self) -> Vec<&'static str> {
        self.inner.chain.link_names()
    }
}

impl Inner {
    /// Split a decoded request into its call context and message.
    fn accept<T>(&self, method: Method, request: tonic::Request<T>) -> (CallContext, T) {
        let now = Instant::now();
        let peer = Arc::new(peer_identity(&request));
        let (metadata, _, message) = request.into_parts();
        let requested = metadata
            .get(GRPC_TIMEOUT)
            .and_then(|value| value.to_str().ok())
            .and_then(middleware::parse_grpc_timeout);

        let ctx = CallContext {
            call_id: self.next_call_id.fetch_add(1, Ordering::Relaxed),
            method,
            metadata,
            deadline: middleware::call_deadline(now, requested, self.default_call_timeout),
            peer,
        };
        (ctx, message)
    }

    async fn run<T>(
        self: Arc<Self>,
        method: Method,
        request: tonic::Request<T>,
        wrap: fn(T) -> Request,
    ) -> CallResult
    where
        T: Send + 'static,
    {
        let (ctx, message) = self.accept(method, request);
        let span = info_span!(
            "call",
            call_id = ctx.call_id,
            method = %method,
            peer = ctx.peer.display_name()
        );
        let inner = self.clone();
        let task = tokio::spawn(
            async move { inner.chain.call(&ctx, wrap(message)).await }.instrument(span),
        );
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(%method, error = %e, "call task failed");
                Err(Status::internal("call task failed"))
            }
        }
    }
}

fn peer_identity<T>(request: &tonic::Request<T>) -> PeerIdentity {
    let certs = request.peer_certs();
    let Some(leaf) = certs.as_deref().and_then(|chain| chain.first()) else {
        warn!("call arrived without a verified peer certificate");
        return PeerIdentity::default();
    };
    PeerIdentity::from_der(leaf.as_ref()).unwrap_or_else(|e| {
        warn!(error = %e, "could not parse peer certificate");
        PeerIdentity::default()
    })
}

fn unexpected_reply(method: Method, reply: &Reply) -> Status {
    error!(%method, ?reply, "handler produced a reply of the wrong kind");
    Status::internal(format!("{method} produced an unexpected reply"))
}

struct AddProductSvc(Arc<Inner>);

impl UnaryService<Product> for AddProductSvc {
    type Response = ProductId;
    type Future = BoxFuture<tonic::Response<ProductId>, Status>;

    fn call(&mut self, request: tonic::Request<Product>) -> Self::Future {
        let inner = self.0.clone();
        Box::pin(async move {
            match inner
                .run(Method::AddProduct, request, Request::AddProduct)
                .await?
            {
                Reply::ProductId(id) => Ok(tonic::Response::new(id)),
                other => Err(unexpected_reply(Method::AddProduct, &other)),
            }
        })
    }
}

struct GetProductSvc(Arc<Inner>);

impl UnaryService<ProductId> for GetProductSvc {
    type Response = Product;
    type Future = BoxFuture<tonic::Response<Product>, Status>;

    fn call(&mut self, request: tonic::Request<ProductId>) -> Self::Future {
        let inner = self.0.clone();
        Box::pin(async move {
            match inner
                .run(Method::GetProduct, request, Request::GetProduct)
                .await?
            {
                Reply::Product(product) => Ok(tonic::Response::new(product)),
                other => Err(unexpected_reply(Method::GetProduct, &other)),
            }
        })
    }
}

impl<B> Service<http::Request<B>> for ProductInfoServer
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let inner = self.inner.clone();
        match Method::from_path(req.uri().path()) {
            Some(Method::AddProduct) => Box::pin(async move {
                let mut grpc = Grpc::new(ProductInfoCodec::<ProductId, Product>::default());
                Ok(grpc.unary(AddProductSvc(inner), req).await)
            }),
            Some(Method::GetProduct) => Box::pin(async move {
                let mut grpc = Grpc::new(ProductInfoCodec::<Product, ProductId>::default());
                Ok(grpc.unary(GetProductSvc(inner), req).await)
            }),
            None => {
                warn!(path = req.uri().path(), "unknown method");
                Box::pin(async move {
                    let mut response = http::Response::new(empty_body());
                    let headers = response.headers_mut();
                    headers.insert(Status::GRPC_STATUS, (Code::Unimplemented as i32).into());
                    headers.insert(
                        http::header::CONTENT_TYPE,
                        tonic::metadata::GRPC_CONTENT_TYPE,
                    );
                    Ok(response)
                })
            }
        }
    }
}

impl NamedService for ProductInfoServer {
    const NAME: &'static str = SERVICE_NAME;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::protocol::AUTHORIZATION;

    use super::*;
    use crate::interceptor::{RecordingSink, StaticToken};
    use crate::server::router;
    use crate::server::state::AppState;

    fn server() -> ProductInfoServer {
        let state = AppState::new(Arc::new(StaticToken::new("tok")))
            .with_observation_sink(Arc::new(RecordingSink::new()));
        ProductInfoServer::new(router::build(&state), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn unknown_path_is_unimplemented() {
        let mut svc = server();
        let req = http::Request::builder()
            .uri("/ecommerce.ProductInfo/deleteProduct")
            .body(empty_body())
            .unwrap();

        let response = svc.call(req).await.unwrap();
        assert_eq!(response.headers()["grpc-status"], "12");
    }

    #[test]
    fn context_takes_timeout_and_metadata_from_request() {
        let svc = server();
        let mut request = tonic::Request::new(ProductId::new("abc"));
        request
            .metadata_mut()
            .insert(GRPC_TIMEOUT, "100m".parse().unwrap());
        request
            .metadata_mut()
            .insert(AUTHORIZATION, "Bearer tok".parse().unwrap());

        let before = Instant::now();
        let (ctx, message) = svc.inner.accept(Method::GetProduct, request);
        assert_eq!(message, ProductId::new("abc"));
        assert_eq!(ctx.method, Method::GetProduct);
        assert_eq!(ctx.metadata_value(AUTHORIZATION), Some("Bearer tok"));
        assert!(ctx.deadline >= before + Duration::from_millis(100));
        assert!(ctx.deadline <= Instant::now() + Duration::from_millis(100));
        assert_eq!(ctx.peer.display_name(), "<unknown>");
    }

    #[test]
    fn malformed_timeout_falls_back_to_default() {
        let svc = server();
        let mut request = tonic::Request::new(ProductId::new("abc"));
        request
            .metadata_mut()
            .insert(GRPC_TIMEOUT, "soon".parse().unwrap());

        let before = Instant::now();
        let (ctx, _) = svc.inner.accept(Method::GetProduct, request);
        assert!(ctx.deadline >= before + Duration::from_secs(5));
    }

    #[test]
    fn call_ids_are_distinct() {
        let svc = server();
        let (first, _) = svc
            .inner
            .accept(Method::GetProduct, tonic::Request::new(ProductId::new("a")));
        let (second, _) = svc
            .clone()
            .inner
            .accept(Method::GetProduct, tonic::Request::new(ProductId::new("b")));
        assert_ne!(first.call_id, second.call_id);
    }

    #[test]
    fn names_the_service() {
        assert_eq!(<ProductInfoServer as NamedService>::NAME, "ecommerce.ProductInfo");
    }
}
