//! Record sources backing paged listings.

pub mod in_memory;
pub mod source;

pub use in_memory::InMemorySource;
pub use source::{RecordSource, SourceError};
