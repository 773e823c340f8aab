//! Per-call deadline policy.

use std::time::Duration;

use tokio::time::Instant;

/// Metadata key carrying the caller's timeout.
pub const GRPC_TIMEOUT: &str = "grpc-timeout";

/// Deadline applied to calls that do not carry a timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on any caller-requested timeout.
pub const MAX_CALL_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Calls one connection may have in flight before further calls queue.
pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 64;

/// Per-call and per-connection limits applied by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallLimits {
    /// Deadline for calls that carry no `grpc-timeout`.
    pub default_timeout: Duration,
    /// In-flight calls allowed on a single connection.
    pub max_concurrent_per_connection: usize,
}

impl Default for CallLimits {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_CALL_TIMEOUT,
            max_concurrent_per_connection: DEFAULT_MAX_CONCURRENT_CALLS,
        }
    }
}

/// Deadline for a call received at `now`.
///
/// `requested` comes from the `grpc-timeout` header; it is clamped to
/// [`MAX_CALL_TIMEOUT`]. A zero timeout is already expired.
pub fn call_deadline(now: Instant, requested: Option<Duration>, default: Duration) -> Instant {
    now + requested.unwrap_or(default).min(MAX_CALL_TIMEOUT)
}

/// Parse a `grpc-timeout` value such as `1500m` or `2S`.
///
/// The value is at most eight ASCII digits followed by one unit character.
/// Anything else yields `None`, and the call falls back to the default.
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || !value.is_ascii() {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;
    let timeout = match unit {
        "H" => Duration::from_secs(amount * 60 * 60),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(timeout)
}
