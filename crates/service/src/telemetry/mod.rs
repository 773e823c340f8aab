//! Structured logging and optional span export for the service.
//!
//! # Telemetry invariants
//!
//! - Bearer tokens and private key material never appear in any span
//!   attribute or log field.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`).
//! - Spans are exported over OTLP only when `OTEL_EXPORTER_OTLP_ENDPOINT` is
//!   set; otherwise the service logs JSON to stdout only.

pub mod init;

pub use init::{init_telemetry, shutdown};
