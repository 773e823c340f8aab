//! [`ChainBuilder`] and the composed [`InterceptorChain`].

use std::fmt;
use std::sync::Arc;

use common::protocol::Request;

use super::{CallResult, Handler, Interceptor, Next};
use crate::server::context::CallContext;

/// Collects links in order and terminates them in a handler.
#[derive(Default)]
pub struct ChainBuilder {
    links: Vec<Arc<dyn Interceptor>>,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a link. Links run in the order they are added.
    pub fn link(mut self, interceptor: impl Interceptor) -> Self {
        self.links.push(Arc::new(interceptor));
        self
    }

    /// Finish the chain with `handler` as its innermost step.
    pub fn handler(self, handler: impl Handler) -> InterceptorChain {
        InterceptorChain {
            links: self.links,
            handler: Arc::new(handler),
        }
    }
}

/// A fixed sequence of links ending in a handler.
///
/// Immutable once built and shared by every connection.
pub struct InterceptorChain {
    links: Vec<Arc<dyn Interceptor>>,
    handler: Arc<dyn Handler>,
}

impl InterceptorChain {
    /// Run one call through every link and the handler.
    pub async fn call(&self, ctx: &CallContext, request: Request) -> CallResult {
        Next::new(&self.links, self.handler.as_ref())
            .run(ctx, request)
            .await
    }

    /// Link names in invocation order.
    pub fn link_names(&self) -> Vec<&'static str> {
        self.links.iter().map(|link| link.name()).collect()
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("links", &self.link_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use common::protocol::{Method, Product, ProductId, Reply};
    use common::{Code, Status};

    use super::*;
    use crate::interceptor::BoxFuture;

    type Trace = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        trace: Trace,
    }

    impl Interceptor for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn intercept<'a>(
            &'a self,
            ctx: &'a CallContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, CallResult> {
            Box::pin(async move {
                self.trace.lock().unwrap().push(format!("{}:pre", self.name));
                let outcome = next.run(ctx, request).await;
                self.trace.lock().unwrap().push(format!("{}:post", self.name));
                outcome
            })
        }
    }

    struct Reject;

    impl Interceptor for Reject {
        fn name(&self) -> &'static str {
            "reject"
        }

        fn intercept<'a>(
            &'a self,
            _ctx: &'a CallContext,
            _request: Request,
            _next: Next<'a>,
        ) -> BoxFuture<'a, CallResult> {
            Box::pin(async { Err(Status::unauthenticated("no")) })
        }
    }

    struct Echo {
        trace: Trace,
        delay: Duration,
    }

    impl Handler for Echo {
        fn handle<'a>(
            &'a self,
            _ctx: &'a CallContext,
            request: Request,
        ) -> BoxFuture<'a, CallResult> {
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                self.trace.lock().unwrap().push("handler".into());
                match request {
                    Request::GetProduct(id) => Ok(Reply::ProductId(id)),
                    Request::AddProduct(p) => Ok(Reply::Product(p)),
                }
            })
        }
    }

    fn echo(trace: &Trace) -> Echo {
        Echo {
            trace: trace.clone(),
            delay: Duration::ZERO,
        }
    }

    fn recorder(name: &'static str, trace: &Trace) -> Recorder {
        Recorder {
            name,
            trace: trace.clone(),
        }
    }

    fn get(id: &str) -> Request {
        Request::GetProduct(ProductId::new(id))
    }

    #[tokio::test]
    async fn links_nest_in_declaration_order() {
        let trace = Trace::default();
        let chain = ChainBuilder::new()
            .link(recorder("first", &trace))
            .link(recorder("second", &trace))
            .handler(echo(&trace));

        let ctx = CallContext::for_test(Method::GetProduct);
        let reply = chain.call(&ctx, get("x")).await.unwrap();
        assert_eq!(reply, Reply::ProductId(ProductId::new("x")));
        assert_eq!(
            *trace.lock().unwrap(),
            ["first:pre", "second:pre", "handler", "second:post", "first:post"]
        );
    }

    #[tokio::test]
    async fn short_circuit_skips_the_rest() {
        let trace = Trace::default();
        let chain = ChainBuilder::new()
            .link(recorder("outer", &trace))
            .link(Reject)
            .link(recorder("inner", &trace))
            .handler(echo(&trace));

        let ctx = CallContext::for_test(Method::AddProduct);
        let status = chain
            .call(&ctx, Request::AddProduct(Product::new("a", "b", 1.0)))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unauthenticated);
        assert_eq!(*trace.lock().unwrap(), ["outer:pre", "outer:post"]);
    }

    #[tokio::test]
    async fn empty_chain_calls_handler() {
        let trace = Trace::default();
        let chain = ChainBuilder::new().handler(echo(&trace));
        let ctx = CallContext::for_test(Method::GetProduct);
        assert!(chain.call(&ctx, get("y")).await.is_ok());
        assert_eq!(*trace.lock().unwrap(), ["handler"]);
    }

    #[tokio::test]
    async fn link_names_in_order() {
        let trace = Trace::default();
        let chain = ChainBuilder::new()
            .link(recorder("a", &trace))
            .link(Reject)
            .handler(echo(&trace));
        assert_eq!(chain.link_names(), ["a", "reject"]);
    }

    #[tokio::test]
    async fn elapsed_deadline_is_reported() {
        let trace = Trace::default();
        let chain = ChainBuilder::new().handler(Echo {
            trace: trace.clone(),
            delay: Duration::from_secs(5),
        });

        let mut ctx = CallContext::for_test(Method::GetProduct);
        ctx.deadline = tokio::time::Instant::now() + Duration::from_millis(100);
        let status = chain.call(&ctx, get("z")).await.unwrap_err();
        assert_eq!(status.code(), Code::DeadlineExceeded);
        assert!(trace.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn links_unwind_past_an_elapsed_deadline() {
        let trace = Trace::default();
        let chain = ChainBuilder::new()
            .link(recorder("outer", &trace))
            .handler(Echo {
                trace: trace.clone(),
                delay: Duration::from_secs(5),
            });

        let mut ctx = CallContext::for_test(Method::GetProduct);
        ctx.deadline = tokio::time::Instant::now() + Duration::from_millis(100);
        let status = chain.call(&ctx, get("z")).await.unwrap_err();
        assert_eq!(status.code(), Code::DeadlineExceeded);
        assert_eq!(*trace.lock().unwrap(), ["outer:pre", "outer:post"]);
    }
}
