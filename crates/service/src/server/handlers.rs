//! Product-info business logic and its adapter into the interceptor chain.

use std::sync::Arc;

use async_trait::async_trait;
use common::protocol::{Product, ProductId, Reply, Request};
use common::{FieldViolation, ServiceError, Status};
#[cfg(test)]
use mockall::automock;
use tracing::{error, info};

use crate::interceptor::{BoxFuture, CallResult, Handler};
use crate::registry::{IdGenerator, ProductRegistry};
use crate::server::context::CallContext;

/// Product name that is always rejected as invalid input.
pub const REJECTED_NAME: &str = "-1";

/// The product-info operations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProductInfo: Send + Sync {
    /// Store a new product and return its freshly assigned id.
    async fn add_product(&self, product: Product) -> Result<ProductId, ServiceError>;

    /// Fetch a previously stored product.
    async fn get_product(&self, id: ProductId) -> Result<Product, ServiceError>;
}

/// [`ProductInfo`] backed by a [`ProductRegistry`].
#[derive(Clone)]
pub struct ProductInfoService {
    registry: ProductRegistry,
    ids: Arc<dyn IdGenerator>,
}

impl ProductInfoService {
    pub fn new(registry: ProductRegistry, ids: Arc<dyn IdGenerator>) -> Self {
        Self { registry, ids }
    }
}

#[async_trait]
impl ProductInfo for ProductInfoService {
    async fn add_product(&self, product: Product) -> Result<ProductId, ServiceError> {
        if product.name == REJECTED_NAME {
            return Err(ServiceError::Validation {
                message: "Invalid information received".into(),
                violations: vec![FieldViolation::new(
                    "Name",
                    format!("Name {REJECTED_NAME:?} is not a valid product name"),
                )],
            });
        }

        let id = self
            .registry
            .create(product, self.ids.as_ref())
            .await
            .map_err(|e| {
                error!(error = %e, "failed to assign product id");
                ServiceError::IdGeneration(e.to_string())
            })?;

        info!(product_id = %id, "product created");
        Ok(ProductId::new(id))
    }

    async fn get_product(&self, id: ProductId) -> Result<Product, ServiceError> {
        self.registry
            .get(&id.value)
            .await
            .ok_or(ServiceError::NotFound(id.value))
    }
}

/// Dispatches decoded requests to a [`ProductInfo`] implementation.
pub struct ServiceHandler<P> {
    service: P,
}

impl<P> ServiceHandler<P> {
    pub fn new(service: P) -> Self {
        Self { service }
    }
}

impl<P: ProductInfo + 'static> Handler for ServiceHandler<P> {
    fn handle<'a>(&'a self, _ctx: &'a CallContext, request: Request) -> BoxFuture<'a, CallResult> {
        Box::pin(async move {
            let result = match request {
                Request::AddProduct(product) => {
                    self.service.add_product(product).await.map(Reply::ProductId)
                }
                Request::GetProduct(id) => self.service.get_product(id).await.map(Reply::Product),
            };
            result.map_err(Status::from)
        })
    }
}
