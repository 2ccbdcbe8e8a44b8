//! Catalog domain: products, their per-language translations, request
//! validation and the filters used by catalog listings.
//!
//! Pure domain logic; storage lives in `eshop-infra`.

pub mod filter;
pub mod product;
pub mod request;

pub use filter::{manage_filter, public_filter};
pub use product::{Product, ProductRow, ProductTranslation, ProductVm, fields};
pub use request::{ProductCreateRequest, ProductUpdateRequest, validate_price};
