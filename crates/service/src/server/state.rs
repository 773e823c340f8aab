//! Shared application state used to assemble the call chain.

use std::sync::Arc;
use std::time::Duration;

use crate::interceptor::{CredentialValidator, ObservationSink, TracingSink};
use crate::registry::{IdGenerator, ProductRegistry, RandomUuid};
use crate::server::middleware::CallLimits;

/// Everything the chain and handler need, shared by all connections.
///
/// All fields are cheaply cloneable (`Arc`-wrapped or already `Arc`-backed).
#[derive(Clone)]
pub struct AppState {
    /// Store of created products.
    pub registry: ProductRegistry,
    /// Decides which bearer tokens are accepted.
    pub credentials: Arc<dyn CredentialValidator>,
    /// Where the call observer reports to.
    pub observations: Arc<dyn ObservationSink>,
    /// Source of fresh product ids.
    pub ids: Arc<dyn IdGenerator>,
    /// Default deadline and per-connection concurrency.
    pub limits: CallLimits,
}

impl AppState {
    /// State with an empty registry, random UUID ids and tracing observations.
    pub fn new(credentials: Arc<dyn CredentialValidator>) -> Self {
        Self {
            registry: ProductRegistry::new(),
            credentials,
            observations: Arc::new(TracingSink),
            ids: Arc::new(RandomUuid),
            limits: CallLimits::default(),
        }
    }

    pub fn with_observation_sink(mut self, sink: Arc<dyn ObservationSink>) -> Self {
        self.observations = sink;
        self
    }

    pub fn with_default_call_timeout(mut self, timeout: Duration) -> Self {
        self.limits.default_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_calls_per_connection(mut self, max: usize) -> Self {
        self.limits.max_concurrent_per_connection = max;
        self
    }
}
