//! Product-info RPC service.
//!
//! Serves the `ecommerce.ProductInfo` gRPC service over mutually
//! authenticated TLS. Every call is authenticated with a bearer token and
//! observed, then `addProduct` / `getProduct` run against an in-memory
//! registry.

pub mod config;
pub mod interceptor;
pub mod registry;
pub mod server;
pub mod telemetry;

pub use config::Config;
pub use server::Server;
