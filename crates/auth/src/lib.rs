//! `eshop-auth`: claims-based authentication for the back office.
//!
//! Decoupled from HTTP and storage: credentials come from a [`CredentialStore`]
//! implementation and the signing material from a [`SigningConfig`].

pub mod authority;
pub mod claims;
pub mod config;
pub mod error;
pub mod profile;
pub mod roles;
pub mod store;
pub mod token;

pub use authority::TokenAuthority;
pub use claims::{ClaimSet, TokenClaims, TokenError, validate_lifetime};
pub use config::{ConfigError, SigningConfig};
pub use error::AuthError;
pub use profile::{LoginRequest, RegisterRequest, UserUpdateRequest, UserVm};
pub use roles::{ROLE_SEPARATOR, Role, join_roles, split_roles};
pub use store::{
    Credential, CredentialStore, CredentialUpdate, NewCredential, SignInOutcome, StoreError,
    fields as credential_fields,
};
pub use token::{Hs256TokenCodec, TokenValidator};
