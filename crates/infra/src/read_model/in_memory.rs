use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use eshop_core::{FilterSpec, Record};

use super::source::{RecordSource, SourceError};

/// In-memory record source for tests/dev, ordered by entity id.
#[derive(Debug)]
pub struct InMemorySource<R: Record> {
    inner: RwLock<BTreeMap<R::Id, R>>,
}

impl<R: Record> InMemorySource<R> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert or replace a record; returns the previous value.
    pub fn upsert(&self, record: R) -> Result<Option<R>, SourceError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        Ok(map.insert(record.id().clone(), record))
    }

    pub fn remove(&self, id: &R::Id) -> Result<Option<R>, SourceError> {
        Ok(self.inner.write().map_err(|_| poisoned())?.remove(id))
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: Record + Clone> InMemorySource<R> {
    pub fn get(&self, id: &R::Id) -> Option<R> {
        self.inner.read().ok()?.get(id).cloned()
    }
}

impl<R: Record> Default for InMemorySource<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> FromIterator<R> for InMemorySource<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        let map = iter.into_iter().map(|r| (r.id().clone(), r)).collect();
        Self {
            inner: RwLock::new(map),
        }
    }
}

fn poisoned() -> SourceError {
    SourceError::Backend("in-memory source lock poisoned".into())
}

/// Apply `filter`, then skip/take, over records already in id order.
pub(crate) fn page_slice<'a, R, I>(records: I, filter: &FilterSpec, skip: u64, take: u64) -> Vec<R>
where
    R: Record + Clone + 'a,
    I: Iterator<Item = &'a R>,
{
    let skip = usize::try_from(skip).unwrap_or(usize::MAX);
    let take = usize::try_from(take).unwrap_or(usize::MAX);
    records
        .filter(|r| filter.matches(*r))
        .skip(skip)
        .take(take)
        .cloned()
        .collect()
}

#[async_trait]
impl<R> RecordSource<R> for InMemorySource<R>
where
    R: Record + Clone + Send + Sync + 'static,
{
    async fn count(&self, filter: &FilterSpec) -> Result<u64, SourceError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.values().filter(|r| filter.matches(*r)).count() as u64)
    }

    async fn fetch(&self, filter: &FilterSpec, skip: u64, take: u64) -> Result<Vec<R>, SourceError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(page_slice(map.values(), filter, skip, take))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use eshop_core::{Entity, FieldValue};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: u32,
        name: String,
    }

    impl Entity for Row {
        type Id = u32;

        fn id(&self) -> &u32 {
            &self.id
        }
    }

    impl Record for Row {
        fn text(&self, field: &str) -> Option<&str> {
            (field == "name").then_some(self.name.as_str())
        }

        fn has_value(&self, field: &str, value: &FieldValue) -> bool {
            matches!((field, value), ("name", FieldValue::Text(v)) if *v == self.name)
        }
    }

    fn row(id: u32, name: &str) -> Row {
        Row { id, name: name.into() }
    }

    #[tokio::test]
    async fn upsert_replaces_and_remove_drops() {
        let source = InMemorySource::new();
        assert_eq!(source.upsert(row(2, "b")), Ok(None));
        assert_eq!(source.upsert(row(1, "a")), Ok(None));
        assert_eq!(source.upsert(row(2, "B")), Ok(Some(row(2, "b"))));

        let all = source.fetch(&FilterSpec::new(), 0, 10).await.unwrap();
        assert_eq!(all, vec![row(1, "a"), row(2, "B")]);

        assert_eq!(source.remove(&1), Ok(Some(row(1, "a"))));
        assert_eq!(source.remove(&1), Ok(None));
        assert_eq!(source.count(&FilterSpec::new()).await, Ok(1));
    }

    #[test]
    fn poisoned_lock_is_reported_not_swallowed() {
        let source = Arc::new(InMemorySource::new());
        source.upsert(row(1, "a")).unwrap();
        let holder = source.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.inner.write().unwrap();
            panic!("poison the source lock");
        })
        .join();

        assert!(source.upsert(row(2, "b")).is_err());
        assert!(source.remove(&1).is_err());
    }
}
