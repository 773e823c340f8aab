//! Messages and methods of the `ecommerce.ProductInfo` gRPC service.
//!
//! The messages are declared with `prost` derives and match
//! `proto/productinfo.proto` field for field, so no `protoc` step is needed at
//! build time. [`Request`] and [`Reply`] are the in-process view of a call
//! used by the service's interceptor chain; they never go on the wire.

use std::fmt;

/// Metadata key carrying the bearer credential.
pub const AUTHORIZATION: &str = "authorization";

/// Scheme prefix of the `authorization` value.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Fully-qualified protobuf service name.
pub const SERVICE_NAME: &str = "ecommerce.ProductInfo";

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A product record.
///
/// `id` is assigned by the service on creation; whatever the caller sends in
/// `addProduct` is ignored.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Product {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub description: String,
    #[prost(float, tag = "4")]
    pub price: f32,
}

impl Product {
    /// A product that has not been assigned an identifier yet.
    pub fn new(name: impl Into<String>, description: impl Into<String>, price: f32) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            description: description.into(),
            price,
        }
    }
}

/// Identifier of a stored product.
#[derive(Clone, PartialEq, Eq, Hash, prost::Message)]
pub struct ProductId {
    #[prost(string, tag = "1")]
    pub value: String,
}

impl ProductId {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Methods
// ---------------------------------------------------------------------------

/// The methods exposed by the product-info service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    AddProduct,
    GetProduct,
}

impl Method {
    /// HTTP/2 path of the method.
    pub fn path(&self) -> &'static str {
        match self {
            Method::AddProduct => "/ecommerce.ProductInfo/addProduct",
            Method::GetProduct => "/ecommerce.ProductInfo/getProduct",
        }
    }

    /// Look a method up by its HTTP/2 path.
    pub fn from_path(path: &str) -> Option<Self> {
        [Method::AddProduct, Method::GetProduct]
            .into_iter()
            .find(|method| method.path() == path)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A method invocation and its argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    AddProduct(Product),
    GetProduct(ProductId),
}

impl Request {
    pub fn method(&self) -> Method {
        match self {
            Request::AddProduct(_) => Method::AddProduct,
            Request::GetProduct(_) => Method::GetProduct,
        }
    }
}

/// A successful method result.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    ProductId(ProductId),
    Product(Product),
}
