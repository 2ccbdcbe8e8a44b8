use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use eshop_core::{DomainError, DomainResult, ProductId};

use crate::product::{Product, ProductTranslation};

pub const MAX_NAME_LEN: usize = 200;

pub fn validate_price(price: i64) -> DomainResult<()> {
    if price < 0 {
        return Err(DomainError::validation("price must not be negative"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCreateRequest {
    pub price: i64,
    pub original_price: i64,
    pub stock: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub seo_description: String,
    #[serde(default)]
    pub seo_title: String,
    #[serde(default)]
    pub seo_alias: String,
    pub language_id: String,
    #[serde(default)]
    pub category_ids: Vec<i64>,
}

impl ProductCreateRequest {
    pub fn validate(&self) -> DomainResult<()> {
        validate_price(self.price)?;
        if self.original_price < 0 {
            return Err(DomainError::validation("originalPrice must not be negative"));
        }
        if self.stock < 0 {
            return Err(DomainError::validation("stock must not be negative"));
        }
        validate_text(&self.name, &self.language_id)
    }

    /// Build the stored product. Counters start at zero.
    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> Product {
        let mut categories = self.category_ids;
        categories.sort_unstable();
        categories.dedup();

        Product {
            id,
            price: self.price,
            original_price: self.original_price,
            stock: self.stock,
            view_count: 0,
            date_created: now,
            categories,
            translations: vec![ProductTranslation {
                language_id: self.language_id.trim().to_string(),
                name: self.name.trim().to_string(),
                description: self.description,
                details: self.details,
                seo_description: self.seo_description,
                seo_title: self.seo_title,
                seo_alias: self.seo_alias,
            }],
        }
    }
}

/// Replaces the text of one translation of an existing product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdateRequest {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub seo_description: String,
    #[serde(default)]
    pub seo_title: String,
    #[serde(default)]
    pub seo_alias: String,
    pub language_id: String,
}

impl ProductUpdateRequest {
    pub fn validate(&self) -> DomainResult<()> {
        if self.id.get() <= 0 {
            return Err(DomainError::invalid_id("product id must be positive"));
        }
        validate_text(&self.name, &self.language_id)
    }

    pub fn translation(&self) -> ProductTranslation {
        ProductTranslation {
            language_id: self.language_id.trim().to_string(),
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            details: self.details.clone(),
            seo_description: self.seo_description.clone(),
            seo_title: self.seo_title.clone(),
            seo_alias: self.seo_alias.clone(),
        }
    }
}

fn validate_text(name: &str, language_id: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    if language_id.trim().is_empty() {
        return Err(DomainError::validation("languageId is required"));
    }
    Ok(())
}
