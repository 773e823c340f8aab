//! Ordered interceptor chain wrapped around every inbound call.
//!
//! An [`Interceptor`] receives the call context, the request and a [`Next`]
//! handle. It may reject the call outright, delegate by running `next`, and
//! inspect or replace whatever comes back. Links run in declaration order on
//! the way in and unwind in reverse order on the way out; the innermost step
//! is the [`Handler`]. The handler is bounded by the call deadline, so every
//! link sees a `DeadlineExceeded` outcome on the way out.
//!
//! ```ignore
//! struct Timing;
//!
//! impl Interceptor for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn intercept<'a>(
//!         &'a self,
//!         ctx: &'a CallContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, CallResult> {
//!         Box::pin(async move {
//!             let start = std::time::Instant::now();
//!             let outcome = next.run(ctx, request).await;
//!             tracing::debug!(elapsed = ?start.elapsed(), "call finished");
//!             outcome
//!         })
//!     }
//! }
//! ```

pub mod auth;
pub mod chain;
pub mod observer;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use common::protocol::{Reply, Request};
use common::{ServiceError, Status};
use tracing::warn;

use crate::server::context::CallContext;

pub use auth::{CredentialValidator, StaticToken, TokenValidator};
pub use chain::{ChainBuilder, InterceptorChain};
pub use observer::{CallObserver, ObservationSink, RecordingSink, TracingSink};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of one call as seen by links and the handler.
pub type CallResult = Result<Reply, Status>;

/// One link of the chain.
///
/// Implementations must not retain `ctx` or `next` beyond the returned future.
pub trait Interceptor: Send + Sync + 'static {
    /// Short name used in logs and [`InterceptorChain::link_names`].
    fn name(&self) -> &'static str;

    /// Process one call, delegating to `next` to continue the chain.
    fn intercept<'a>(
        &'a self,
        ctx: &'a CallContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, CallResult>;
}

/// Terminal step of the chain: the business logic for a call.
pub trait Handler: Send + Sync + 'static {
    fn handle<'a>(&'a self, ctx: &'a CallContext, request: Request) -> BoxFuture<'a, CallResult>;
}

/// The remainder of the chain after the current link.
///
/// Consumed by [`Next::run`], so a link can continue the chain at most once.
pub struct Next<'a> {
    links: &'a [Arc<dyn Interceptor>],
    handler: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(links: &'a [Arc<dyn Interceptor>], handler: &'a dyn Handler) -> Self {
        Self { links, handler }
    }

    /// Invoke the next link, or the handler if no links remain.
    ///
    /// The handler runs until `ctx.deadline`; past it the handler's work is
    /// dropped and `DeadlineExceeded` is returned.
    pub fn run(self, ctx: &'a CallContext, request: Request) -> BoxFuture<'a, CallResult> {
        match self.links.split_first() {
            Some((link, rest)) => link.intercept(ctx, request, Next::new(rest, self.handler)),
            None => Box::pin(async move {
                let handled = self.handler.handle(ctx, request);
                match tokio::time::timeout_at(ctx.deadline, handled).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(call_id = ctx.call_id, method = %ctx.method, "call deadline exceeded");
                        Err(ServiceError::DeadlineExceeded.into())
                    }
                }
            }),
        }
    }
}
