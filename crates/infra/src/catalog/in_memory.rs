use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use eshop_core::{FilterSpec, ProductId};
use eshop_products::{Product, ProductCreateRequest, ProductRow, ProductUpdateRequest};

use super::store::ProductStore;
use crate::read_model::{RecordSource, SourceError};

#[derive(Debug, Default)]
struct Catalog {
    products: BTreeMap<ProductId, Product>,
    last_id: i64,
}

/// In-memory catalog for tests/dev. Ids are assigned in ascending order and
/// never reused.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    inner: RwLock<Catalog>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|c| c.products.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Catalog>, SourceError> {
        self.inner
            .read()
            .map_err(|_| SourceError::Backend("catalog lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Catalog>, SourceError> {
        self.inner
            .write()
            .map_err(|_| SourceError::Backend("catalog lock poisoned".into()))
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn insert(&self, request: ProductCreateRequest, now: DateTime<Utc>) -> Result<ProductId, SourceError> {
        let mut catalog = self.write()?;
        catalog.last_id += 1;
        let id = ProductId::new(catalog.last_id);
        catalog.products.insert(id, request.into_product(id, now));
        Ok(id)
    }

    async fn update(&self, request: &ProductUpdateRequest) -> Result<u64, SourceError> {
        let mut catalog = self.write()?;
        match catalog.products.get_mut(&request.id) {
            Some(product) => {
                product.upsert_translation(request.translation());
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete(&self, id: ProductId) -> Result<u64, SourceError> {
        Ok(u64::from(self.write()?.products.remove(&id).is_some()))
    }

    async fn update_price(&self, id: ProductId, new_price: i64) -> Result<bool, SourceError> {
        let mut catalog = self.write()?;
        match catalog.products.get_mut(&id) {
            Some(product) => {
                product.price = new_price;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find(&self, id: ProductId, language_id: &str) -> Result<Option<ProductRow>, SourceError> {
        Ok(self
            .read()?
            .products
            .get(&id)
            .and_then(|p| p.row(language_id)))
    }
}

#[async_trait]
impl RecordSource<ProductRow> for InMemoryProductStore {
    async fn count(&self, filter: &FilterSpec) -> Result<u64, SourceError> {
        let catalog = self.read()?;
        Ok(catalog
            .products
            .values()
            .flat_map(Product::rows)
            .filter(|row| filter.matches(row))
            .count() as u64)
    }

    async fn fetch(&self, filter: &FilterSpec, skip: u64, take: u64) -> Result<Vec<ProductRow>, SourceError> {
        let catalog = self.read()?;
        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let take = usize::try_from(take).unwrap_or(usize::MAX);
        // Rows come out ordered by product id; translations within a product
        // are sorted by language so the order stays stable across updates.
        Ok(catalog
            .products
            .values()
            .flat_map(|p| {
                let mut rows: Vec<_> = p.rows().collect();
                rows.sort_by(|a, b| a.translation.language_id.cmp(&b.translation.language_id));
                rows
            })
            .filter(|row| filter.matches(row))
            .skip(skip)
            .take(take)
            .collect())
    }
}
