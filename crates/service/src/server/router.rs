//! Call chain construction.

use crate::interceptor::{CallObserver, ChainBuilder, InterceptorChain, TokenValidator};

use super::handlers::{ProductInfoService, ServiceHandler};
use super::state::AppState;

/// Build the service's chain: authentication, then observation, then the
/// product-info handler.
pub fn build(state: &AppState) -> InterceptorChain {
    ChainBuilder::new()
        .link(TokenValidator::new(state.credentials.clone()))
        .link(CallObserver::new(state.observations.clone()))
        .handler(ServiceHandler::new(ProductInfoService::new(
            state.registry.clone(),
            state.ids.clone(),
        )))
}
