//! Product catalog service: validation, single-record operations and the two
//! catalog listings.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use eshop_core::{Deadline, DomainError, PageRequest, PageResult, ProductId, RetryPolicy};
use eshop_products::{
    ProductCreateRequest, ProductRow, ProductUpdateRequest, ProductVm, manage_filter,
    public_filter, validate_price,
};

use super::store::ProductBackend;
use crate::paging::{PagedQueryEngine, QueryError};
use crate::read_model::SourceError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("product not found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

impl From<DomainError> for CatalogError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::NotFound => CatalogError::NotFound,
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => CatalogError::Validation(msg),
        }
    }
}

impl From<SourceError> for CatalogError {
    fn from(value: SourceError) -> Self {
        match value {
            SourceError::UnsupportedFilter(msg) => CatalogError::Validation(msg),
            SourceError::Unavailable(msg) | SourceError::Backend(msg) => CatalogError::Unavailable(msg),
        }
    }
}

impl From<QueryError> for CatalogError {
    fn from(value: QueryError) -> Self {
        match value {
            QueryError::Rejected(msg) => CatalogError::Validation(msg),
            QueryError::Unavailable(msg) => CatalogError::Unavailable(msg),
        }
    }
}

pub struct ProductCatalog {
    store: Arc<dyn ProductBackend>,
    engine: PagedQueryEngine,
    deadline: Deadline,
    retry: RetryPolicy,
}

impl ProductCatalog {
    pub fn new(store: Arc<dyn ProductBackend>) -> Self {
        Self {
            store,
            engine: PagedQueryEngine::new(),
            deadline: Deadline::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Apply the same deadline and retry budget to paging and single calls.
    pub fn with_resilience(mut self, deadline: Deadline, retry: RetryPolicy) -> Self {
        self.engine = self.engine.with_deadline(deadline).with_retry(retry);
        self.deadline = deadline;
        self.retry = retry;
        self
    }

    pub async fn create(
        &self,
        request: ProductCreateRequest,
        now: DateTime<Utc>,
    ) -> Result<ProductId, CatalogError> {
        request.validate()?;
        let id = self.write(self.store.insert(request, now)).await?;
        tracing::info!(product_id = %id, "product created");
        Ok(id)
    }

    pub async fn update(&self, request: &ProductUpdateRequest) -> Result<u64, CatalogError> {
        request.validate()?;
        let affected = self.write(self.store.update(request)).await?;
        tracing::info!(product_id = %request.id, affected, "product updated");
        Ok(affected)
    }

    pub async fn delete(&self, id: ProductId) -> Result<u64, CatalogError> {
        let affected = self.write(self.store.delete(id)).await?;
        tracing::info!(product_id = %id, affected, "product deleted");
        Ok(affected)
    }

    pub async fn update_price(&self, id: ProductId, new_price: i64) -> Result<bool, CatalogError> {
        validate_price(new_price)?;
        let updated = self.write(self.store.update_price(id, new_price)).await?;
        tracing::info!(product_id = %id, updated, "product price changed");
        Ok(updated)
    }

    pub async fn get_by_id(&self, id: ProductId, language_id: &str) -> Result<ProductVm, CatalogError> {
        let deadline = self.deadline;
        let row = self
            .retry
            .run(
                "find_product",
                || {
                    let fut = self.store.find(id, language_id);
                    async move { deadline.run(fut).await.unwrap_or_else(|e| Err(elapsed(e))) }
                },
                SourceError::is_transient,
            )
            .await?;
        row.map(ProductVm::from).ok_or(CatalogError::NotFound)
    }

    /// Back-office listing.
    pub async fn manage_paging(&self, request: &PageRequest) -> Result<PageResult<ProductVm>, CatalogError> {
        let filter = manage_filter(request);
        Ok(self
            .engine
            .page(&*self.store, request, &filter, |row: ProductRow| ProductVm::from(row))
            .await?)
    }

    /// Storefront listing for one language.
    pub async fn public_paging(
        &self,
        language_id: &str,
        request: &PageRequest,
    ) -> Result<PageResult<ProductVm>, CatalogError> {
        let filter = public_filter(language_id, request);
        Ok(self
            .engine
            .page(&*self.store, request, &filter, |row: ProductRow| ProductVm::from(row))
            .await?)
    }

    /// Mutations run once under the deadline; they are never retried.
    async fn write<T, Fut>(&self, fut: Fut) -> Result<T, CatalogError>
    where
        Fut: Future<Output = Result<T, SourceError>>,
    {
        Ok(self
            .deadline
            .run(fut)
            .await
            .unwrap_or_else(|e| Err(elapsed(e)))?)
    }
}

fn elapsed(e: eshop_core::DeadlineElapsed) -> SourceError {
    SourceError::Unavailable(e.to_string())
}
