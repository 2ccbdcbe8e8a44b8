//! Postgres-backed product catalog.
//!
//! The listing filter is compiled once into [`CatalogQuery`] and bound into
//! both the count and the fetch statement, which share one WHERE clause.
//! Rows are ordered by product id, then language.
//!
//! Schema: `migrations/0001_catalog.sql`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use eshop_core::{FieldValue, FilterSpec, Predicate, ProductId};
use eshop_products::{
    Product, ProductCreateRequest, ProductRow, ProductTranslation, ProductUpdateRequest, fields,
};

use super::store::ProductStore;
use crate::read_model::{RecordSource, SourceError};

const WHERE_CLAUSE: &str = r#"
    WHERE ($1::text IS NULL OR pt.name ILIKE '%' || $1 || '%' ESCAPE '\')
      AND ($2::text IS NULL OR pt.language_id = $2)
      AND ($3::bigint IS NULL OR EXISTS (
            SELECT 1 FROM product_in_categories pic
            WHERE pic.product_id = p.id AND pic.category_id = $3))
"#;

const SELECT_COLUMNS: &str = r#"
    SELECT
        p.id,
        p.price,
        p.original_price,
        p.stock,
        p.view_count,
        p.date_created,
        ARRAY(
            SELECT pic.category_id FROM product_in_categories pic
            WHERE pic.product_id = p.id ORDER BY pic.category_id
        ) AS categories,
        pt.language_id,
        pt.name,
        pt.description,
        pt.details,
        pt.seo_description,
        pt.seo_title,
        pt.seo_alias
    FROM products p
    JOIN product_translations pt ON pt.product_id = p.id
"#;

/// A [`FilterSpec`] reduced to the parameters the catalog SQL understands.
#[derive(Debug, Default, PartialEq, Eq)]
struct CatalogQuery {
    name_pattern: Option<String>,
    language_id: Option<String>,
    category_id: Option<i64>,
}

impl CatalogQuery {
    fn compile(filter: &FilterSpec) -> Result<Self, SourceError> {
        let mut query = CatalogQuery::default();
        for predicate in filter.predicates() {
            match predicate {
                Predicate::Contains { fields: f, needle } if f.as_slice() == [fields::NAME] => {
                    query.name_pattern = Some(escape_like(needle));
                }
                Predicate::Equals {
                    field: fields::LANGUAGE_ID,
                    value: FieldValue::Text(lang),
                } => query.language_id = Some(lang.clone()),
                Predicate::Equals {
                    field: fields::CATEGORY_ID,
                    value: FieldValue::Int(category),
                } => query.category_id = Some(*category),
                other => {
                    return Err(SourceError::UnsupportedFilter(format!(
                        "catalog cannot evaluate {other:?}"
                    )));
                }
            }
        }
        Ok(query)
    }
}

fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, FromRow)]
struct ProductRowRecord {
    id: i64,
    price: i64,
    original_price: i64,
    stock: i64,
    view_count: i64,
    date_created: DateTime<Utc>,
    categories: Vec<i64>,
    language_id: String,
    name: String,
    description: String,
    details: String,
    seo_description: String,
    seo_title: String,
    seo_alias: String,
}

impl From<ProductRowRecord> for ProductRow {
    fn from(r: ProductRowRecord) -> Self {
        let product = Product {
            id: ProductId::new(r.id),
            price: r.price,
            original_price: r.original_price,
            stock: r.stock,
            view_count: r.view_count,
            date_created: r.date_created,
            categories: r.categories,
            translations: Vec::new(),
        };
        ProductRow::new(
            &product,
            ProductTranslation {
                language_id: r.language_id,
                name: r.name,
                description: r.description,
                details: r.details,
                seo_description: r.seo_description,
                seo_title: r.seo_title,
                seo_alias: r.seo_alias,
            },
        )
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> SourceError {
    tracing::warn!(operation, error = %err, "catalog query failed");
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            SourceError::Unavailable(format!("{operation}: {err}"))
        }
        other => SourceError::Backend(format!("{operation}: {other}")),
    }
}

#[derive(Debug, Clone)]
pub struct PostgresProductStore {
    pool: Arc<PgPool>,
}

impl PostgresProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl RecordSource<ProductRow> for PostgresProductStore {
    #[instrument(skip(self, filter))]
    async fn count(&self, filter: &FilterSpec) -> Result<u64, SourceError> {
        let q = CatalogQuery::compile(filter)?;
        let sql = format!(
            "SELECT COUNT(*) AS total FROM products p \
             JOIN product_translations pt ON pt.product_id = p.id {WHERE_CLAUSE}"
        );
        let row = sqlx::query(&sql)
            .bind(q.name_pattern)
            .bind(q.language_id)
            .bind(q.category_id)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_products", e))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| SourceError::Backend(format!("failed to read count: {e}")))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    #[instrument(skip(self, filter))]
    async fn fetch(&self, filter: &FilterSpec, skip: u64, take: u64) -> Result<Vec<ProductRow>, SourceError> {
        let q = CatalogQuery::compile(filter)?;
        let sql = format!(
            "{SELECT_COLUMNS} {WHERE_CLAUSE} ORDER BY p.id ASC, pt.language_id ASC LIMIT $4 OFFSET $5"
        );
        let rows = sqlx::query_as::<_, ProductRowRecord>(&sql)
            .bind(q.name_pattern)
            .bind(q.language_id)
            .bind(q.category_id)
            .bind(i64::try_from(take).unwrap_or(i64::MAX))
            .bind(i64::try_from(skip).unwrap_or(i64::MAX))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_products", e))?;
        Ok(rows.into_iter().map(ProductRow::from).collect())
    }
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    #[instrument(skip(self, request))]
    async fn insert(&self, request: ProductCreateRequest, now: DateTime<Utc>) -> Result<ProductId, SourceError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(
            r#"
            INSERT INTO products (price, original_price, stock, view_count, date_created)
            VALUES ($1, $2, $3, 0, $4)
            RETURNING id
            "#,
        )
        .bind(request.price)
        .bind(request.original_price)
        .bind(request.stock)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        let id: i64 = row
            .try_get("id")
            .map_err(|e| SourceError::Backend(format!("failed to read id: {e}")))?;

        let product = request.into_product(ProductId::new(id), now);
        for t in &product.translations {
            insert_translation(&mut tx, id, t).await?;
        }
        for category in &product.categories {
            sqlx::query("INSERT INTO product_in_categories (product_id, category_id) VALUES ($1, $2)")
                .bind(id)
                .bind(category)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_product_category", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(ProductId::new(id))
    }

    #[instrument(skip(self, request), fields(product_id = %request.id))]
    async fn update(&self, request: &ProductUpdateRequest) -> Result<u64, SourceError> {
        let t = request.translation();
        let result = sqlx::query(
            r#"
            INSERT INTO product_translations
                (product_id, language_id, name, description, details, seo_description, seo_title, seo_alias)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8
            WHERE EXISTS (SELECT 1 FROM products WHERE id = $1)
            ON CONFLICT (product_id, language_id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                details = EXCLUDED.details,
                seo_description = EXCLUDED.seo_description,
                seo_title = EXCLUDED.seo_title,
                seo_alias = EXCLUDED.seo_alias
            "#,
        )
        .bind(request.id.get())
        .bind(&t.language_id)
        .bind(&t.name)
        .bind(&t.description)
        .bind(&t.details)
        .bind(&t.seo_description)
        .bind(&t.seo_title)
        .bind(&t.seo_alias)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_translation", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: ProductId) -> Result<u64, SourceError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn update_price(&self, id: ProductId, new_price: i64) -> Result<bool, SourceError> {
        let result = sqlx::query("UPDATE products SET price = $2 WHERE id = $1")
            .bind(id.get())
            .bind(new_price)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_price", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn find(&self, id: ProductId, language_id: &str) -> Result<Option<ProductRow>, SourceError> {
        let sql = format!("{SELECT_COLUMNS} WHERE p.id = $1 AND pt.language_id = $2");
        let row = sqlx::query_as::<_, ProductRowRecord>(&sql)
            .bind(id.get())
            .bind(language_id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_product", e))?;
        Ok(row.map(ProductRow::from))
    }
}

async fn insert_translation(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    product_id: i64,
    t: &ProductTranslation,
) -> Result<(), SourceError> {
    sqlx::query(
        r#"
        INSERT INTO product_translations
            (product_id, language_id, name, description, details, seo_description, seo_title, seo_alias)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(product_id)
    .bind(&t.language_id)
    .bind(&t.name)
    .bind(&t.description)
    .bind(&t.details)
    .bind(&t.seo_description)
    .bind(&t.seo_title)
    .bind(&t.seo_alias)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_translation", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use eshop_core::PageRequest;
    use eshop_products::{manage_filter, public_filter};

    use super::*;

    #[test]
    fn manage_filter_compiles_to_three_parameters() {
        let request = PageRequest::new(1, 10)
            .unwrap()
            .with_keyword("50%_off")
            .with_language("en-US")
            .with_category(4);
        let q = CatalogQuery::compile(&manage_filter(&request)).unwrap();
        assert_eq!(q.name_pattern.as_deref(), Some("50\\%\\_off"));
        assert_eq!(q.language_id.as_deref(), Some("en-US"));
        assert_eq!(q.category_id, Some(4));
    }

    #[test]
    fn public_filter_has_no_keyword() {
        let request = PageRequest::new(1, 10).unwrap().with_keyword("ignored");
        let q = CatalogQuery::compile(&public_filter("vi-VN", &request)).unwrap();
        assert_eq!(q.name_pattern, None);
        assert_eq!(q.language_id.as_deref(), Some("vi-VN"));
    }

    #[test]
    fn unknown_predicates_are_refused() {
        let filter = FilterSpec::new().equals("stock", FieldValue::Int(1));
        assert!(matches!(
            CatalogQuery::compile(&filter),
            Err(SourceError::UnsupportedFilter(_))
        ));
    }
}
