//! PagedQueryEngine: count + bounded fetch against a [`RecordSource`].

use std::future::Future;

use thiserror::Error;

use eshop_core::{Deadline, FilterSpec, PageRequest, PageResult, Record, RetryPolicy};

use crate::read_model::{RecordSource, SourceError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("record source unavailable: {0}")]
    Unavailable(String),

    #[error("query rejected: {0}")]
    Rejected(String),
}

impl From<SourceError> for QueryError {
    fn from(value: SourceError) -> Self {
        match value {
            SourceError::Unavailable(msg) | SourceError::Backend(msg) => QueryError::Unavailable(msg),
            SourceError::UnsupportedFilter(msg) => QueryError::Rejected(msg),
        }
    }
}

/// Read-only pager. Holds configuration only, so one engine can serve every
/// request concurrently.
#[derive(Debug, Clone, Copy, Default)]
pub struct PagedQueryEngine {
    deadline: Deadline,
    retry: RetryPolicy,
}

impl PagedQueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Count every record matching `filter`, fetch the requested slice in
    /// stable order and project it.
    ///
    /// A page past the end yields no items; `total_records` is unaffected.
    pub async fn page<R, S, V>(
        &self,
        source: &S,
        request: &PageRequest,
        filter: &FilterSpec,
        project: impl FnMut(R) -> V,
    ) -> Result<PageResult<V>, QueryError>
    where
        R: Record,
        S: RecordSource<R> + ?Sized,
    {
        let total = self.read("count", || source.count(filter)).await?;

        let (skip, take) = (request.skip(), request.take());
        let items = if skip >= total {
            Vec::new()
        } else {
            self.read("fetch", || source.fetch(filter, skip, take)).await?
        };

        tracing::debug!(
            total,
            page_index = request.page_index(),
            page_size = request.page_size(),
            returned = items.len(),
            "page assembled"
        );

        Ok(PageResult::new(request, items.into_iter().map(project).collect(), total))
    }

    async fn read<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, QueryError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let deadline = self.deadline;
        self.retry
            .run(
                operation,
                || {
                    let fut = call();
                    async move {
                        deadline
                            .run(fut)
                            .await
                            .unwrap_or_else(|e| Err(SourceError::Unavailable(e.to_string())))
                    }
                },
                SourceError::is_transient,
            )
            .await
            .map_err(|e| {
                tracing::warn!(operation, error = %e, "record source call failed");
                QueryError::from(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use eshop_core::{Entity, FieldValue};
    use proptest::prelude::*;

    use super::*;
    use crate::read_model::InMemorySource;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: u32,
        label: String,
    }

    impl Entity for Item {
        type Id = u32;

        fn id(&self) -> &u32 {
            &self.id
        }
    }

    impl Record for Item {
        fn text(&self, field: &str) -> Option<&str> {
            (field == "label").then_some(self.label.as_str())
        }

        fn has_value(&self, field: &str, value: &FieldValue) -> bool {
            matches!((field, value), ("label", FieldValue::Text(v)) if *v == self.label)
        }
    }

    fn items(n: u32) -> InMemorySource<Item> {
        // Inserted in reverse so order comes from the key, not insertion.
        (1..=n)
            .rev()
            .map(|id| Item {
                id,
                label: if id % 2 == 0 { "even".into() } else { "odd".into() },
            })
            .collect()
    }

    fn engine() -> PagedQueryEngine {
        PagedQueryEngine::new().with_retry(RetryPolicy::none())
    }

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
    }

    /// Counts calls and fails the first `failures` of them.
    struct Flaky {
        inner: InMemorySource<Item>,
        calls: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl RecordSource<Item> for Flaky {
        async fn count(&self, filter: &FilterSpec) -> Result<u64, SourceError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(SourceError::Unavailable("connection reset".into()));
            }
            self.inner.count(filter).await
        }

        async fn fetch(&self, filter: &FilterSpec, skip: u64, take: u64) -> Result<Vec<Item>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(filter, skip, take).await
        }
    }

    struct Stalled;

    #[async_trait]
    impl RecordSource<Item> for Stalled {
        async fn count(&self, _filter: &FilterSpec) -> Result<u64, SourceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(0)
        }

        async fn fetch(&self, _: &FilterSpec, _: u64, _: u64) -> Result<Vec<Item>, SourceError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn twenty_five_records_in_pages_of_ten() {
        let source = items(25);
        let filter = FilterSpec::new();

        let mut seen = Vec::new();
        for (index, expected) in [(1, 10), (2, 10), (3, 5), (4, 0)] {
            let request = PageRequest::new(index, 10).unwrap();
            let page = engine().page(&source, &request, &filter, |i: Item| i.id).await.unwrap();
            assert_eq!(page.items.len(), expected, "page {index}");
            assert_eq!(page.total_records, 25);
            assert_eq!(page.page_index, index);
            seen.extend(page.items);
        }
        assert_eq!(seen, (1..=25).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn filter_applies_to_count_and_fetch() {
        let source = items(25);
        let filter = FilterSpec::new().equals("label", FieldValue::Text("even".into()));
        let page = engine()
            .page(&source, &PageRequest::new(2, 5).unwrap(), &filter, |i: Item| i.id)
            .await
            .unwrap();
        assert_eq!(page.total_records, 12);
        assert_eq!(page.items, vec![12, 14, 16, 18, 20]);
    }

    #[tokio::test]
    async fn page_past_the_end_skips_the_fetch() {
        let source = Flaky {
            inner: items(3),
            calls: AtomicU32::new(0),
            failures: 0,
        };
        let page = engine()
            .page(&source, &PageRequest::new(5, 10).unwrap(), &FilterSpec::new(), |i: Item| i)
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_records, 3);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_count_failures_are_retried() {
        let source = Flaky {
            inner: items(4),
            calls: AtomicU32::new(0),
            failures: 1,
        };
        let engine = PagedQueryEngine::new().with_retry(RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        });
        let page = engine
            .page(&source, &PageRequest::new(1, 10).unwrap(), &FilterSpec::new(), |i: Item| i.id)
            .await
            .unwrap();
        assert_eq!(page.total_records, 4);
    }

    #[tokio::test]
    async fn stalled_source_hits_the_deadline() {
        let engine = engine().with_deadline(Deadline::new(Duration::from_millis(20)));
        let err = engine
            .page(&Stalled, &PageRequest::new(1, 10).unwrap(), &FilterSpec::new(), |i: Item| i)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Unavailable(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, ..ProptestConfig::default() })]

        /// Property: items.len() == max(0, min(s, N - (p-1)*s)) and totalRecords == N.
        #[test]
        fn page_length_law(n in 0u32..120, p in 1u32..15, s in 1u32..40) {
            let source = items(n);
            let request = PageRequest::new(p, s).unwrap();
            let page = rt()
                .block_on(engine().page(&source, &request, &FilterSpec::new(), |i: Item| i.id))
                .unwrap();

            let before = u64::from(p - 1) * u64::from(s);
            let expected = u64::from(n).saturating_sub(before).min(u64::from(s));
            prop_assert_eq!(page.items.len() as u64, expected);
            prop_assert_eq!(page.total_records, u64::from(n));
        }

        /// Property: two identical consecutive calls return identical pages.
        #[test]
        fn paging_is_idempotent(n in 0u32..60, p in 1u32..8, s in 1u32..20) {
            let source = items(n);
            let request = PageRequest::new(p, s).unwrap();
            let filter = FilterSpec::new().contains(&["label"], Some("ev"));
            let rt = rt();
            let first = rt.block_on(engine().page(&source, &request, &filter, |i: Item| i)).unwrap();
            let second = rt.block_on(engine().page(&source, &request, &filter, |i: Item| i)).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
