//! Catalog listing filters.

use eshop_core::{FieldValue, FilterSpec, PageRequest};

use crate::product::fields;

/// Back-office listing: keyword in the name, optional language and category.
///
/// Without a language every translation is listed as its own row.
pub fn manage_filter(request: &PageRequest) -> FilterSpec {
    FilterSpec::new()
        .contains(&[fields::NAME], request.keyword())
        .equals_opt(
            fields::LANGUAGE_ID,
            request.language_id().map(|l| FieldValue::Text(l.to_string())),
        )
        .equals_opt(fields::CATEGORY_ID, request.category_id().map(FieldValue::Int))
}

/// Storefront listing: one language, optional category. Keywords are ignored.
pub fn public_filter(language_id: &str, request: &PageRequest) -> FilterSpec {
    FilterSpec::new()
        .equals(fields::LANGUAGE_ID, FieldValue::Text(language_id.to_string()))
        .equals_opt(fields::CATEGORY_ID, request.category_id().map(FieldValue::Int))
}
