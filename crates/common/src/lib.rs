//! Common types, gRPC messages, error details and TLS setup shared across the
//! `productinfo-rpc` crates.

pub mod codec;
pub mod detail;
pub mod error;
pub mod protocol;
pub mod tls;

pub use detail::{ErrorDetail, FieldViolation, StatusDetailsExt};
pub use error::ServiceError;

// Re-export tonic's status model so callers need not depend on tonic directly.
pub use tonic::{Code, Status};
