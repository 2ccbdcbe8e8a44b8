//! Credential storage backing the token authority.

pub mod in_memory;
pub mod policy;

pub use in_memory::InMemoryCredentialStore;
pub use policy::{LockoutPolicy, PasswordPolicy};
