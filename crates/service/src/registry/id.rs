//! Product identifier generation.

#[cfg(test)]
use mockall::automock;

use super::RegistryError;

/// Source of fresh product identifiers.
#[cfg_attr(test, automock)]
pub trait IdGenerator: Send + Sync {
    /// Mint a new identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::IdGeneration`] if no identifier could be produced.
    fn generate(&self) -> Result<String, RegistryError>;
}

/// Random version-4 UUIDs drawn from the operating system's CSPRNG.
///
/// Unlike `Uuid::new_v4`, a failing entropy source surfaces as an error
/// instead of a panic.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomUuid;

impl IdGenerator for RandomUuid {
    fn generate(&self) -> Result<String, RegistryError> {
        let mut bytes = [0u8; 16];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| RegistryError::IdGeneration(e.to_string()))?;
        Ok(uuid::Builder::from_random_bytes(bytes)
            .into_uuid()
            .to_string())
    }
}
