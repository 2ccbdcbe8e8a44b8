use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use eshop_core::ProductId;
use eshop_products::{ProductCreateRequest, ProductRow, ProductUpdateRequest};

use crate::read_model::{RecordSource, SourceError};

/// Single-record catalog mutations and lookups.
///
/// Mutations report affected rows (0 means the product does not exist); the
/// store never treats "not found" as an error.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn insert(&self, request: ProductCreateRequest, now: DateTime<Utc>) -> Result<ProductId, SourceError>;

    /// Upsert the translation named by the request's language.
    async fn update(&self, request: &ProductUpdateRequest) -> Result<u64, SourceError>;

    async fn delete(&self, id: ProductId) -> Result<u64, SourceError>;

    async fn update_price(&self, id: ProductId, new_price: i64) -> Result<bool, SourceError>;

    async fn find(&self, id: ProductId, language_id: &str) -> Result<Option<ProductRow>, SourceError>;
}

/// Everything the catalog service needs from its backend.
pub trait ProductBackend: ProductStore + RecordSource<ProductRow> {}

impl<T> ProductBackend for T where T: ProductStore + RecordSource<ProductRow> {}

#[async_trait]
impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    async fn insert(&self, request: ProductCreateRequest, now: DateTime<Utc>) -> Result<ProductId, SourceError> {
        (**self).insert(request, now).await
    }

    async fn update(&self, request: &ProductUpdateRequest) -> Result<u64, SourceError> {
        (**self).update(request).await
    }

    async fn delete(&self, id: ProductId) -> Result<u64, SourceError> {
        (**self).delete(id).await
    }

    async fn update_price(&self, id: ProductId, new_price: i64) -> Result<bool, SourceError> {
        (**self).update_price(id, new_price).await
    }

    async fn find(&self, id: ProductId, language_id: &str) -> Result<Option<ProductRow>, SourceError> {
        (**self).find(id, language_id).await
    }
}
