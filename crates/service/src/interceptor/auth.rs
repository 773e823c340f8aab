//! Bearer-token authentication link.
//!
//! Every call must carry `authorization: Bearer <token>` metadata. There is
//! no per-method bypass.

use std::fmt;
use std::sync::Arc;

use common::protocol::{Request, AUTHORIZATION, BEARER_PREFIX};
use common::ServiceError;
#[cfg(test)]
use mockall::automock;
use subtle::ConstantTimeEq;
use tracing::warn;

use super::{BoxFuture, CallResult, Interceptor, Next};
use crate::server::context::CallContext;

/// Decides whether a presented bearer token is acceptable.
#[cfg_attr(test, automock)]
pub trait CredentialValidator: Send + Sync {
    fn validate(&self, token: &str) -> bool;
}

/// Accepts exactly one configured token.
///
/// Comparison is constant-time with respect to the token contents.
pub struct StaticToken {
    expected: Vec<u8>,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            expected: token.into().into_bytes(),
        }
    }
}

impl CredentialValidator for StaticToken {
    fn validate(&self, token: &str) -> bool {
        token.as_bytes().ct_eq(&self.expected).into()
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken([REDACTED])")
    }
}

/// Rejects calls whose `authorization` metadata does not validate.
pub struct TokenValidator {
    validator: Arc<dyn CredentialValidator>,
}

impl TokenValidator {
    pub fn new(validator: Arc<dyn CredentialValidator>) -> Self {
        Self { validator }
    }

    fn authorize(&self, ctx: &CallContext) -> Result<(), ServiceError> {
        let value = ctx
            .metadata_value(AUTHORIZATION)
            .ok_or(ServiceError::MissingCredential)?;
        let token = value
            .strip_prefix(BEARER_PREFIX)
            .ok_or(ServiceError::InvalidCredential)?;
        if self.validator.validate(token) {
            Ok(())
        } else {
            Err(ServiceError::InvalidCredential)
        }
    }
}

impl Interceptor for TokenValidator {
    fn name(&self) -> &'static str {
        "token-validator"
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a CallContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, CallResult> {
        Box::pin(async move {
            match self.authorize(ctx) {
                Ok(()) => next.run(ctx, request).await,
                Err(e) => {
                    warn!(
                        call_id = ctx.call_id,
                        method = %ctx.method,
                        peer = ctx.peer.display_name(),
                        reason = %e,
                        "call rejected"
                    );
                    Err(e.into())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use common::protocol::{Method, ProductId, Reply};
    use common::Code;

    use super::*;
    use crate::interceptor::{ChainBuilder, Handler};

    struct AcceptAll;

    impl Handler for AcceptAll {
        fn handle<'a>(&'a self, _: &'a CallContext, _: Request) -> BoxFuture<'a, CallResult> {
            Box::pin(async { Ok(Reply::ProductId(ProductId::new("ok"))) })
        }
    }

    fn ctx_with(auth: Option<&str>) -> CallContext {
        let mut ctx = CallContext::for_test(Method::GetProduct);
        if let Some(value) = auth {
            ctx.metadata.insert(AUTHORIZATION, value.parse().unwrap());
        }
        ctx
    }

    async fn run(validator: impl CredentialValidator + 'static, auth: Option<&str>) -> CallResult {
        let chain = ChainBuilder::new()
            .link(TokenValidator::new(Arc::new(validator)))
            .handler(AcceptAll);
        chain
            .call(&ctx_with(auth), Request::GetProduct(ProductId::new("id")))
            .await
    }

    #[test]
    fn static_token_matches_exactly() {
        let token = StaticToken::new("some-secret-token");
        assert!(token.validate("some-secret-token"));
        assert!(!token.validate("some-secret-toke"));
        assert!(!token.validate("some-secret-token "));
        assert!(!token.validate(""));
    }

    #[test]
    fn static_token_debug_is_redacted() {
        let dbg = format!("{:?}", StaticToken::new("some-secret-token"));
        assert!(!dbg.contains("some-secret-token"));
    }

    #[tokio::test]
    async fn valid_bearer_passes_through() {
        let mut validator = MockCredentialValidator::new();
        validator
            .expect_validate()
            .withf(|token| token == "good")
            .times(1)
            .return_const(true);

        assert!(run(validator, Some("Bearer good")).await.is_ok());
    }

    #[tokio::test]
    async fn missing_authorization_is_unauthenticated() {
        let mut validator = MockCredentialValidator::new();
        validator.expect_validate().times(0);

        let status = run(validator, None).await.unwrap_err();
        assert_eq!(status.code(), Code::Unauthenticated);
        assert_eq!(status.message(), "missing credential");
    }

    #[tokio::test]
    async fn mismatched_token_is_unauthenticated() {
        let mut validator = MockCredentialValidator::new();
        validator.expect_validate().times(1).return_const(false);

        let status = run(validator, Some("Bearer wrong")).await.unwrap_err();
        assert_eq!(status.code(), Code::Unauthenticated);
        assert_eq!(status.message(), "invalid credential");
    }

    #[tokio::test]
    async fn missing_bearer_prefix_is_invalid() {
        let mut validator = MockCredentialValidator::new();
        validator.expect_validate().times(0);

        let status = run(validator, Some("good")).await.unwrap_err();
        assert_eq!(status.code(), Code::Unauthenticated);
        assert_eq!(status.message(), "invalid credential");
    }

    #[tokio::test]
    async fn static_token_through_the_chain() {
        let ok = run(StaticToken::new("t0k"), Some("Bearer t0k")).await;
        assert!(ok.is_ok());
        let err = run(StaticToken::new("t0k"), Some("Bearer t0K")).await;
        assert_eq!(err.unwrap_err().code(), Code::Unauthenticated);
    }
}
