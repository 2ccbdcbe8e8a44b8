use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use eshop_core::{FilterSpec, Record};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Backing store unreachable or too slow; safe to retry reads.
    #[error("record source unavailable: {0}")]
    Unavailable(String),

    /// The source cannot evaluate the filter (unknown field, bad value).
    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("record source error: {0}")]
    Backend(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }
}

/// Read side of a paged listing.
///
/// `count` and `fetch` must agree on the filter semantics, and `fetch` must
/// order by the record's entity id so that consecutive pages never overlap.
#[async_trait]
pub trait RecordSource<R: Record>: Send + Sync {
    async fn count(&self, filter: &FilterSpec) -> Result<u64, SourceError>;

    async fn fetch(&self, filter: &FilterSpec, skip: u64, take: u64) -> Result<Vec<R>, SourceError>;
}

#[async_trait]
impl<R, S> RecordSource<R> for Arc<S>
where
    R: Record + Send + 'static,
    S: RecordSource<R> + ?Sized,
{
    async fn count(&self, filter: &FilterSpec) -> Result<u64, SourceError> {
        (**self).count(filter).await
    }

    async fn fetch(&self, filter: &FilterSpec, skip: u64, take: u64) -> Result<Vec<R>, SourceError> {
        (**self).fetch(filter, skip, take).await
    }
}
