//! Product catalog: storage seam, backends and the catalog service.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod service;
pub mod store;

pub use in_memory::InMemoryProductStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresProductStore;
pub use service::{CatalogError, ProductCatalog};
pub use store::{ProductBackend, ProductStore};
