//! gRPC server: mTLS listener, call context, chain assembly and handlers.

pub mod context;
pub mod grpc;
pub mod handlers;
pub mod listener;
pub mod middleware;
pub mod router;
pub mod state;
pub mod tls;

pub use grpc::ProductInfoServer;
pub use listener::Server;
