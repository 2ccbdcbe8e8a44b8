//! `eshop-core`: contracts shared by the API server and the admin client.
//!
//! Nothing in here talks to storage or HTTP; the only runtime dependency is the
//! tokio timer used by [`resilience`].

pub mod api_result;
pub mod entity;
pub mod error;
pub mod id;
pub mod paging;
pub mod query;
pub mod resilience;

pub use api_result::ApiResult;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ProductId, UserId};
pub use paging::{MAX_PAGE_SIZE, PageRequest, PageResult, PagingParams};
pub use query::{FieldValue, FilterSpec, Predicate, Record};
pub use resilience::{Deadline, DeadlineElapsed, RetryPolicy};
