//! Per-call credentials attached by the client.

use std::fmt;
use std::sync::Arc;

use common::protocol::{AUTHORIZATION, BEARER_PREFIX};
use common::Status;
use tonic::metadata::{Ascii, MetadataMap, MetadataValue};
use tonic::service::Interceptor;

/// Something that adds authentication metadata to an outgoing call.
pub trait CallCredentials: Send + Sync {
    /// # Errors
    ///
    /// Returns a status if the credential cannot be expressed as metadata;
    /// the call then fails without being sent.
    fn apply(&self, metadata: &mut MetadataMap) -> Result<(), Status>;
}

/// A static bearer token sent as `authorization: Bearer <token>`.
#[derive(Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl CallCredentials for BearerToken {
    fn apply(&self, metadata: &mut MetadataMap) -> Result<(), Status> {
        let value: MetadataValue<Ascii> = format!("{BEARER_PREFIX}{}", self.token)
            .parse()
            .map_err(|_| Status::unauthenticated("bearer token is not a valid metadata value"))?;
        metadata.insert(AUTHORIZATION, value);
        Ok(())
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

/// Interceptor applying the endpoint's credentials to every call on a
/// channel.
#[derive(Clone, Default)]
pub struct CredentialCarrier {
    credentials: Option<Arc<dyn CallCredentials>>,
}

impl CredentialCarrier {
    pub fn new(credentials: Option<Arc<dyn CallCredentials>>) -> Self {
        Self { credentials }
    }
}

impl Interceptor for CredentialCarrier {
    fn call(&mut self, mut request: tonic::Request<()>) -> Result<tonic::Request<()>, Status> {
        if let Some(credentials) = &self.credentials {
            credentials.apply(request.metadata_mut())?;
        }
        Ok(request)
    }
}

impl fmt::Debug for CredentialCarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCarrier")
            .field("credentials", &self.credentials.is_some())
            .finish()
    }
}
