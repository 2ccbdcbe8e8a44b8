//! Offset pagination contracts shared by every listing endpoint.
//!
//! [`PagingParams`] is the raw query-string shape. [`PageRequest`] is the
//! validated form; its index and size cannot be zero, so code that receives a
//! `PageRequest` never re-checks them.

use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Largest page a caller may ask for.
pub const MAX_PAGE_SIZE: u32 = 1000;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Query-string shape: `?pageIndex=&pageSize=&keyword=&languageId=&categoryId=`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
}

/// A validated page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    page_index: NonZeroU32,
    page_size: NonZeroU32,
    keyword: Option<String>,
    language_id: Option<String>,
    category_id: Option<i64>,
}

impl PageRequest {
    /// Build a request from a 1-based page index and a page size.
    pub fn new(page_index: u32, page_size: u32) -> DomainResult<Self> {
        let page_index = NonZeroU32::new(page_index)
            .ok_or_else(|| DomainError::validation("pageIndex must be >= 1"))?;
        let page_size = NonZeroU32::new(page_size)
            .ok_or_else(|| DomainError::validation("pageSize must be >= 1"))?;
        if page_size.get() > MAX_PAGE_SIZE {
            return Err(DomainError::validation(format!(
                "pageSize must be <= {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self {
            page_index,
            page_size,
            keyword: None,
            language_id: None,
            category_id: None,
        })
    }

    /// Blank keywords are treated as "no keyword".
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = non_blank(keyword.into());
        self
    }

    pub fn with_language(mut self, language_id: impl Into<String>) -> Self {
        self.language_id = non_blank(language_id.into());
        self
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn page_index(&self) -> u32 {
        self.page_index.get()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.get()
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    pub fn language_id(&self) -> Option<&str> {
        self.language_id.as_deref()
    }

    pub fn category_id(&self) -> Option<i64> {
        self.category_id
    }

    /// Number of filtered records that precede this page.
    pub fn skip(&self) -> u64 {
        u64::from(self.page_index.get() - 1) * u64::from(self.page_size.get())
    }

    pub fn take(&self) -> u64 {
        u64::from(self.page_size.get())
    }
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn positive_u32(value: Option<i64>, default: u32, name: &str) -> DomainResult<u32> {
    match value {
        None => Ok(default),
        Some(v) if v < 1 => Err(DomainError::validation(format!("{name} must be >= 1"))),
        Some(v) => u32::try_from(v)
            .map_err(|_| DomainError::validation(format!("{name} is out of range"))),
    }
}

impl TryFrom<PagingParams> for PageRequest {
    type Error = DomainError;

    fn try_from(params: PagingParams) -> Result<Self, Self::Error> {
        let index = positive_u32(params.page_index, 1, "pageIndex")?;
        let size = positive_u32(params.page_size, DEFAULT_PAGE_SIZE, "pageSize")?;

        let mut request = PageRequest::new(index, size)?;
        if let Some(keyword) = params.keyword {
            request = request.with_keyword(keyword);
        }
        if let Some(language_id) = params.language_id {
            request = request.with_language(language_id);
        }
        if let Some(category_id) = params.category_id {
            request = request.with_category(category_id);
        }
        Ok(request)
    }
}

impl From<&PageRequest> for PagingParams {
    fn from(request: &PageRequest) -> Self {
        Self {
            page_index: Some(i64::from(request.page_index())),
            page_size: Some(i64::from(request.page_size())),
            keyword: request.keyword.clone(),
            language_id: request.language_id.clone(),
            category_id: request.category_id,
        }
    }
}

/// Page envelope: `{items, totalRecords, pageIndex, pageSize}`.
///
/// `total_records` is the unpaged filtered count and does not depend on how
/// many items landed on this page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total_records: u64,
    pub page_index: u32,
    pub page_size: u32,
}

impl<T> PageResult<T> {
    pub fn new(request: &PageRequest, items: Vec<T>, total_records: u64) -> Self {
        Self {
            items,
            total_records,
            page_index: request.page_index(),
            page_size: request.page_size(),
        }
    }

    pub fn page_count(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_records.div_ceil(u64::from(self.page_size))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            items: self.items.into_iter().map(f).collect(),
            total_records: self.total_records,
            page_index: self.page_index,
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(index: Option<i64>, size: Option<i64>) -> PagingParams {
        PagingParams {
            page_index: index,
            page_size: size,
            ..Default::default()
        }
    }

    #[test]
    fn missing_index_and_size_use_defaults() {
        let req = PageRequest::try_from(PagingParams::default()).unwrap();
        assert_eq!(req.page_index(), 1);
        assert_eq!(req.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(req.skip(), 0);
    }

    #[test]
    fn zero_or_negative_values_are_rejected() {
        for (i, s) in [(Some(0), Some(10)), (Some(1), Some(0)), (Some(-3), Some(5)), (Some(2), Some(-1))] {
            let err = PageRequest::try_from(params(i, s)).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "{i:?}/{s:?}");
        }
    }

    #[test]
    fn oversized_pages_are_rejected() {
        let err = PageRequest::try_from(params(Some(1), Some(i64::from(MAX_PAGE_SIZE) + 1)))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(PageRequest::try_from(params(Some(i64::MAX), Some(10))).is_err());
    }

    #[test]
    fn skip_is_offset_of_previous_pages() {
        let req = PageRequest::new(3, 10).unwrap();
        assert_eq!(req.skip(), 20);
        assert_eq!(req.take(), 10);
    }

    #[test]
    fn blank_filters_are_dropped() {
        let req = PageRequest::try_from(PagingParams {
            keyword: Some("   ".into()),
            language_id: Some("".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(req.keyword(), None);
        assert_eq!(req.language_id(), None);
    }

    #[test]
    fn page_result_serializes_with_wire_names() {
        let req = PageRequest::new(2, 5).unwrap();
        let page = PageResult::new(&req, vec!["a", "b"], 7);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalRecords"], 7);
        assert_eq!(json["pageIndex"], 2);
        assert_eq!(json["pageSize"], 5);
        assert_eq!(json["items"].as_array().unwrap().len(), 2);
        assert_eq!(page.page_count(), 2);
    }

    #[test]
    fn params_round_trip_through_request() {
        let req = PageRequest::new(4, 20)
            .unwrap()
            .with_keyword("shirt")
            .with_language("vi-VN")
            .with_category(3);
        let back = PageRequest::try_from(PagingParams::from(&req)).unwrap();
        assert_eq!(req, back);
    }
}
