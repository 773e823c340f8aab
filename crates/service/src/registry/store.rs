//! [`ProductRegistry`]: thread-safe map from product id to record.

use std::collections::HashMap;
use std::sync::Arc;

use common::protocol::Product;
use thiserror::Error;
use tokio::sync::RwLock;

use super::IdGenerator;

/// How many times [`ProductRegistry::create`] re-draws an id that collides with
/// an existing record before giving up.
const MAX_ID_ATTEMPTS: usize = 3;

/// Errors produced by the registry layer.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The identifier source failed.
    #[error("identifier generation failed: {0}")]
    IdGeneration(String),

    /// Every drawn identifier was already taken.
    #[error("no unused identifier after {0} attempts")]
    IdExhausted(usize),
}

/// Thread-safe store of created products.
///
/// Wraps an `Arc<RwLock<HashMap<..>>>` so that:
/// - Lookups take the shared read lock and run concurrently.
/// - Creation holds the exclusive write lock across id minting, the duplicate
///   check and the insert, so two concurrent creates can never observe the same
///   free id.
#[derive(Clone, Debug, Default)]
pub struct ProductRegistry {
    inner: Arc<RwLock<HashMap<String, Product>>>,
}

impl ProductRegistry {
    /// Create a new, empty [`ProductRegistry`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a fresh id to `product`, store it and return the id.
    ///
    /// Any id already set on `product` is overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if no unused id could be minted. The registry
    /// is left unchanged.
    pub async fn create(
        &self,
        mut product: Product,
        ids: &dyn IdGenerator,
    ) -> Result<String, RegistryError> {
        let mut map = self.inner.write().await;
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = ids.generate()?;
            if map.contains_key(&id) {
                tracing::warn!("generated product id collided with an existing record");
                continue;
            }
            product.id = id.clone();
            map.insert(id.clone(), product);
            return Ok(id);
        }
        Err(RegistryError::IdExhausted(MAX_ID_ATTEMPTS))
    }

    /// Look up a product by id.
    pub async fn get(&self, id: &str) -> Option<Product> {
        self.inner.read().await.get(id).cloned()
    }

    /// Number of stored products.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Returns `true` if nothing has been stored yet.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
