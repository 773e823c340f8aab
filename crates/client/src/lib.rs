//! Product-info gRPC client.
//!
//! Connects to the service over mutually authenticated TLS, attaches a bearer
//! credential to every call and exposes typed `add_product` / `get_product`
//! methods.

pub mod client;
pub mod config;
pub mod credentials;
pub mod report;
pub mod telemetry;

pub use client::{ConnectError, Endpoint, ProductInfoClient};
pub use config::Config;
pub use credentials::{BearerToken, CallCredentials, CredentialCarrier};
