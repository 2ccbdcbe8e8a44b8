//! Signing configuration (the "signing key provider").
//!
//! Loaded once at startup and passed by value to whatever issues or validates
//! tokens; nothing reads the environment per request.

use chrono::Duration;
use thiserror::Error;

/// Minimum HS256 key length in bytes.
pub const MIN_KEY_LEN: usize = 32;

/// Tokens are valid for three hours after issuance.
pub const DEFAULT_TOKEN_LIFETIME_HOURS: i64 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("signing key must be at least {MIN_KEY_LEN} bytes (got {0})")]
    KeyTooShort(usize),

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Clone)]
pub struct SigningConfig {
    key: Vec<u8>,
    issuer: String,
    audience: String,
    lifetime: Duration,
}

impl SigningConfig {
    pub fn new(
        key: impl Into<Vec<u8>>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.len() < MIN_KEY_LEN {
            return Err(ConfigError::KeyTooShort(key.len()));
        }
        let issuer = issuer.into();
        if issuer.trim().is_empty() {
            return Err(ConfigError::Empty("issuer"));
        }
        let audience = audience.into();
        if audience.trim().is_empty() {
            return Err(ConfigError::Empty("audience"));
        }
        Ok(Self {
            key,
            issuer,
            audience,
            lifetime: Duration::hours(DEFAULT_TOKEN_LIFETIME_HOURS),
        })
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Read `TOKENS_KEY`, `TOKENS_ISSUER` and `TOKENS_AUDIENCE`.
    ///
    /// The audience falls back to the issuer when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let key = std::env::var("TOKENS_KEY").map_err(|_| ConfigError::Missing("TOKENS_KEY"))?;
        let issuer =
            std::env::var("TOKENS_ISSUER").map_err(|_| ConfigError::Missing("TOKENS_ISSUER"))?;
        let audience = std::env::var("TOKENS_AUDIENCE").unwrap_or_else(|_| issuer.clone());
        Self::new(key.into_bytes(), issuer, audience)
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }
}

impl core::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("key", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}
