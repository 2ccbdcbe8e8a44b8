use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use eshop_core::{Entity, FieldValue, ProductId, Record};

/// Field names understood by [`ProductRow`] filters.
pub mod fields {
    pub const NAME: &str = "name";
    pub const LANGUAGE_ID: &str = "languageId";
    pub const CATEGORY_ID: &str = "categoryId";
}

/// Language-specific text of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductTranslation {
    pub language_id: String,
    pub name: String,
    pub description: String,
    pub details: String,
    pub seo_description: String,
    pub seo_title: String,
    pub seo_alias: String,
}

/// A catalog product with all of its translations.
///
/// Prices are in the smallest currency unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub price: i64,
    pub original_price: i64,
    pub stock: i64,
    pub view_count: i64,
    pub date_created: DateTime<Utc>,
    pub categories: Vec<i64>,
    pub translations: Vec<ProductTranslation>,
}

impl Product {
    pub fn translation(&self, language_id: &str) -> Option<&ProductTranslation> {
        self.translations
            .iter()
            .find(|t| t.language_id == language_id)
    }

    /// Replace the translation for its language, or add it.
    pub fn upsert_translation(&mut self, translation: ProductTranslation) {
        match self
            .translations
            .iter_mut()
            .find(|t| t.language_id == translation.language_id)
        {
            Some(existing) => *existing = translation,
            None => self.translations.push(translation),
        }
    }

    /// One listing row per translation.
    pub fn rows(&self) -> impl Iterator<Item = ProductRow> + '_ {
        self.translations.iter().map(|t| ProductRow::new(self, t.clone()))
    }

    pub fn row(&self, language_id: &str) -> Option<ProductRow> {
        self.translation(language_id)
            .map(|t| ProductRow::new(self, t.clone()))
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &ProductId {
        &self.id
    }
}

/// A product seen through one language: the unit that catalog listings page
/// over. Ordered by product id, then language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    key: (ProductId, String),
    pub price: i64,
    pub original_price: i64,
    pub stock: i64,
    pub view_count: i64,
    pub date_created: DateTime<Utc>,
    pub categories: Vec<i64>,
    pub translation: ProductTranslation,
}

impl ProductRow {
    pub fn new(product: &Product, translation: ProductTranslation) -> Self {
        Self {
            key: (product.id, translation.language_id.clone()),
            price: product.price,
            original_price: product.original_price,
            stock: product.stock,
            view_count: product.view_count,
            date_created: product.date_created,
            categories: product.categories.clone(),
            translation,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.key.0
    }
}

impl Entity for ProductRow {
    type Id = (ProductId, String);

    fn id(&self) -> &Self::Id {
        &self.key
    }
}

impl Record for ProductRow {
    fn text(&self, field: &str) -> Option<&str> {
        match field {
            fields::NAME => Some(&self.translation.name),
            fields::LANGUAGE_ID => Some(&self.translation.language_id),
            _ => None,
        }
    }

    fn has_value(&self, field: &str, value: &FieldValue) -> bool {
        match (field, value) {
            (fields::LANGUAGE_ID, FieldValue::Text(lang)) => &self.translation.language_id == lang,
            (fields::NAME, FieldValue::Text(name)) => &self.translation.name == name,
            (fields::CATEGORY_ID, FieldValue::Int(category)) => self.categories.contains(category),
            _ => false,
        }
    }
}

/// Flattened view of one product in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVm {
    pub id: ProductId,
    pub price: i64,
    pub original_price: i64,
    pub stock: i64,
    pub view_count: i64,
    pub date_created: DateTime<Utc>,
    pub name: String,
    pub description: String,
    pub details: String,
    pub seo_description: String,
    pub seo_title: String,
    pub seo_alias: String,
    pub language_id: String,
}

impl From<ProductRow> for ProductVm {
    fn from(row: ProductRow) -> Self {
        let id = row.product_id();
        let t = row.translation;
        Self {
            id,
            price: row.price,
            original_price: row.original_price,
            stock: row.stock,
            view_count: row.view_count,
            date_created: row.date_created,
            name: t.name,
            description: t.description,
            details: t.details,
            seo_description: t.seo_description,
            seo_title: t.seo_title,
            seo_alias: t.seo_alias,
            language_id: t.language_id,
        }
    }
}
