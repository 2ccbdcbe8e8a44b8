//! Admin front-end client: typed HTTP clients for the back-office API and the
//! admin-side session store.

pub mod client;
pub mod config;
pub mod error;
pub mod session;

pub use client::{BaseApiClient, ProductApiClient, UserApiClient};
pub use config::AdminConfig;
pub use error::ClientError;
pub use session::{AdminSession, SessionError, SessionId, SessionStore};
