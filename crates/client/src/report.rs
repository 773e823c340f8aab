//! Logging of failed calls.
//!
//! Callers branch on the coarse code first and only look for typed detail on
//! validation failures.

use common::{Code, FieldViolation, Status, StatusDetailsExt};
use tracing::{error, warn};

/// Field violations carried by `status`, if it is a validation failure.
pub fn violations(status: &Status) -> Vec<FieldViolation> {
    match status.code() {
        Code::InvalidArgument => status.field_violations(),
        _ => Vec::new(),
    }
}

/// Log a failed call at a level matching its code.
pub fn log_status(operation: &str, status: &Status) {
    match status.code() {
        Code::InvalidArgument => {
            warn!(operation, message = status.message(), "invalid argument");
            for violation in violations(status) {
                warn!(
                    operation,
                    field = %violation.field,
                    description = %violation.description,
                    "request field rejected"
                );
            }
        }
        Code::Unauthenticated => {
            error!(operation, message = status.message(), "call not authenticated");
        }
        Code::NotFound => warn!(operation, message = status.message(), "not found"),
        code => error!(operation, code = %code, message = status.message(), "call failed"),
    }
}

#[cfg(test)]
mod tests {
    use common::detail::with_field_violations;

    use super::*;

    fn rejected(code: Code) -> Status {
        with_field_violations(code, "bad", &[FieldViolation::new("Name", "no")])
    }

    #[test]
    fn violations_only_for_invalid_argument() {
        assert_eq!(violations(&rejected(Code::InvalidArgument)).len(), 1);
        assert!(violations(&rejected(Code::Internal)).is_empty());
    }

    #[test]
    fn log_status_handles_every_code() {
        for status in [
            rejected(Code::InvalidArgument),
            Status::unauthenticated("x"),
            Status::not_found("x"),
            Status::unavailable("x"),
        ] {
            log_status("AddProduct", &status);
        }
    }
}
