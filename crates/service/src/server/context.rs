//! Per-call context handed to every interceptor and the handler.

use std::sync::Arc;

use common::protocol::Method;
use common::tls::PeerIdentity;
use tokio::time::Instant;
use tonic::metadata::MetadataMap;

/// Read-only facts about one inbound call.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Process-unique id assigned when the call is accepted.
    pub call_id: u64,
    pub method: Method,
    /// Request metadata as received, including `grpc-timeout`.
    pub metadata: MetadataMap,
    /// Point in time after which the call is abandoned.
    pub deadline: Instant,
    /// Identity of the verified client certificate.
    pub peer: Arc<PeerIdentity>,
}

impl CallContext {
    /// Value of the ASCII metadata entry `key`, if present and printable.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|value| value.to_str().ok())
    }

    /// A context with empty metadata and a generous deadline.
    #[cfg(test)]
    pub(crate) fn for_test(method: Method) -> Self {
        Self {
            call_id: 1,
            method,
            metadata: MetadataMap::new(),
            deadline: Instant::now() + std::time::Duration::from_secs(30),
            peer: Arc::new(PeerIdentity::default()),
        }
    }
}
