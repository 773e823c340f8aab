//! Typed error details carried alongside a [`Status`].
//!
//! Field violations travel as a `google.rpc.BadRequest` record inside the
//! standard `grpc-status-details-bin` trailer, so any gRPC client can read
//! them. Decoding maps each attached record back onto the closed
//! [`ErrorDetail`] enum: `BadRequest` is recognised explicitly, anything else
//! lands in [`ErrorDetail::Unknown`].
//!
//! Details never carry failure semantics on their own. If they cannot be
//! attached, the status goes out bare; if they cannot be read, the caller
//! still has the code and message.

use prost::Message;
use thiserror::Error;
use tonic::{Code, Status};
use tonic_types::{ErrorDetails, StatusExt};
use tracing::warn;

/// Type url of the `google.rpc.BadRequest` detail record.
pub const BAD_REQUEST_TYPE_URL: &str = "type.googleapis.com/google.rpc.BadRequest";

/// Largest encoded detail payload attached to a status (8 KiB).
///
/// Details ride in an HTTP/2 trailer, and peers cap the size of header blocks.
pub const MAX_DETAILS_LEN: usize = 8 * 1024;

/// A field-level input violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Name of the offending request field.
    pub field: String,
    /// Why the value was rejected.
    pub description: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            description: description.into(),
        }
    }
}

impl From<&FieldViolation> for tonic_types::FieldViolation {
    fn from(v: &FieldViolation) -> Self {
        tonic_types::FieldViolation::new(v.field.clone(), v.description.clone())
    }
}

/// A decoded detail record.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    /// A field-level validation failure.
    FieldViolation(FieldViolation),
    /// A record whose `type_url` this build does not handle.
    Unknown { type_url: String, value: Vec<u8> },
}

/// Errors produced while encoding or decoding detail records.
#[derive(Debug, Error)]
pub enum DetailError {
    #[error("encoded details are {len} bytes, limit is {max}", max = MAX_DETAILS_LEN)]
    TooLarge { len: usize },

    #[error("malformed error details: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Build a status carrying `violations` as a `BadRequest` detail.
///
/// # Errors
///
/// Returns [`DetailError::TooLarge`] if the encoded details exceed
/// [`MAX_DETAILS_LEN`].
pub fn try_with_field_violations(
    code: Code,
    message: impl Into<String>,
    violations: &[FieldViolation],
) -> Result<Status, DetailError> {
    let details = ErrorDetails::with_bad_request(
        violations
            .iter()
            .map(tonic_types::FieldViolation::from)
            .collect::<Vec<_>>(),
    );
    let status = Status::with_error_details(code, message, details);
    let len = status.details().len();
    if len > MAX_DETAILS_LEN {
        return Err(DetailError::TooLarge { len });
    }
    Ok(status)
}

/// Build a status carrying `violations`, falling back to the bare status when
/// the details cannot be attached.
pub fn with_field_violations(
    code: Code,
    message: impl Into<String>,
    violations: &[FieldViolation],
) -> Status {
    let message = message.into();
    match try_with_field_violations(code, message.clone(), violations) {
        Ok(status) => status,
        Err(e) => {
            warn!(code = ?code, error = %e, "dropping error details");
            Status::new(code, message)
        }
    }
}

/// Read typed details off a received [`Status`].
pub trait StatusDetailsExt {
    /// Decode every attached detail record.
    ///
    /// # Errors
    ///
    /// Returns [`DetailError::Decode`] if the detail payload is not a valid
    /// `google.rpc.Status`, or a `BadRequest` record is malformed. Unknown
    /// record types are not an error.
    fn error_details(&self) -> Result<Vec<ErrorDetail>, DetailError>;

    /// Field violations attached to a validation failure.
    ///
    /// Only `InvalidArgument` statuses are inspected. Records of unexpected
    /// type, and payloads that fail to decode, are logged and skipped.
    fn field_violations(&self) -> Vec<FieldViolation>;
}

impl StatusDetailsExt for Status {
    fn error_details(&self) -> Result<Vec<ErrorDetail>, DetailError> {
        if self.details().is_empty() {
            return Ok(Vec::new());
        }
        let status = tonic_types::pb::Status::decode(self.details())?;

        let mut decoded = Vec::new();
        for any in status.details {
            if any.type_url == BAD_REQUEST_TYPE_URL {
                let bad_request = tonic_types::pb::BadRequest::decode(any.value.as_slice())?;
                decoded.extend(bad_request.field_violations.into_iter().map(|v| {
                    ErrorDetail::FieldViolation(FieldViolation::new(v.field, v.description))
                }));
            } else {
                decoded.push(ErrorDetail::Unknown {
                    type_url: any.type_url,
                    value: any.value,
                });
            }
        }
        Ok(decoded)
    }

    fn field_violations(&self) -> Vec<FieldViolation> {
        if self.code() != Code::InvalidArgument {
            return Vec::new();
        }
        let details = match self.error_details() {
            Ok(details) => details,
            Err(e) => {
                warn!(error = %e, "unreadable error details");
                return Vec::new();
            }
        };

        let mut violations = Vec::new();
        for detail in details {
            match detail {
                ErrorDetail::FieldViolation(v) => violations.push(v),
                ErrorDetail::Unknown { type_url, .. } => {
                    warn!(%type_url, "unexpected error detail type");
                }
            }
        }
        violations
    }
}
