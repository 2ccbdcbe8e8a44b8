//! Infrastructure layer: record sources, the paged query engine, credential
//! storage and the product catalog.

pub mod catalog;
pub mod credentials;
pub mod paging;
pub mod read_model;
pub mod users;

pub use catalog::{CatalogError, InMemoryProductStore, ProductBackend, ProductCatalog, ProductStore};
#[cfg(feature = "postgres")]
pub use catalog::PostgresProductStore;
pub use credentials::{InMemoryCredentialStore, LockoutPolicy, PasswordPolicy};
pub use paging::{PagedQueryEngine, QueryError};
pub use read_model::{InMemorySource, RecordSource, SourceError};
pub use users::UserDirectory;
