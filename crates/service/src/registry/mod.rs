//! In-memory product registry and identifier minting.
//!
//! Records live for the lifetime of the process; there is no persistence and
//! no deletion.

pub mod id;
pub mod store;

pub use id::{IdGenerator, RandomUuid};
pub use store::{ProductRegistry, RegistryError};
