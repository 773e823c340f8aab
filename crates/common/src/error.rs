//! Common error types shared across crates.

use thiserror::Error;
use tonic::{Code, Status};

use crate::detail::{self, FieldViolation};

/// Top-level call error type.
///
/// Variants map to the gRPC [`Code`]s returned to callers:
/// - [`ServiceError::MissingCredential`], [`ServiceError::InvalidCredential`] → `Unauthenticated`
/// - [`ServiceError::Validation`] → `InvalidArgument` (with field violations)
/// - [`ServiceError::NotFound`] → `NotFound`
/// - [`ServiceError::DeadlineExceeded`] → `DeadlineExceeded`
/// - [`ServiceError::IdGeneration`], [`ServiceError::Internal`] → `Internal`
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The call carried no `authorization` metadata at all.
    #[error("missing credential")]
    MissingCredential,

    /// The call carried a credential that did not validate.
    #[error("invalid credential")]
    InvalidCredential,

    /// The handler rejected one or more request fields.
    #[error("{message}")]
    Validation {
        message: String,
        violations: Vec<FieldViolation>,
    },

    /// A fresh product identifier could not be minted.
    #[error("failed to generate product id: {0}")]
    IdGeneration(String),

    /// No product is registered under the requested identifier.
    #[error("product {0} does not exist")]
    NotFound(String),

    /// The caller's deadline elapsed before the call completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the gRPC code that should be sent for this error.
    pub fn code(&self) -> Code {
        match self {
            ServiceError::MissingCredential | ServiceError::InvalidCredential => {
                Code::Unauthenticated
            }
            ServiceError::Validation { .. } => Code::InvalidArgument,
            ServiceError::NotFound(_) => Code::NotFound,
            ServiceError::DeadlineExceeded => Code::DeadlineExceeded,
            ServiceError::IdGeneration(_) | ServiceError::Internal(_) => Code::Internal,
        }
    }

    /// Convert into a [`Status`], attaching field violations for validation
    /// failures.
    pub fn into_status(self) -> Status {
        let code = self.code();
        let message = self.to_string();
        match self {
            ServiceError::Validation { violations, .. } => {
                detail::with_field_violations(code, message, &violations)
            }
            _ => Status::new(code, message),
        }
    }
}

impl From<ServiceError> for Status {
    fn from(e: ServiceError) -> Self {
        e.into_status()
    }
}
