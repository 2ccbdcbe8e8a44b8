//! Admin client configuration, read once from the environment.

use chrono::Duration;

use eshop_auth::{ConfigError, SigningConfig};
use eshop_core::RetryPolicy;

const DEFAULT_BASE_ADDRESS: &str = "http://localhost:8080";
const DEFAULT_LANGUAGE_ID: &str = "vi-VN";

/// Admin sessions last ten minutes unless the token runs out first.
pub const DEFAULT_SESSION_MINUTES: i64 = 10;

#[derive(Clone)]
pub struct AdminConfig {
    pub base_address: String,
    pub session_lifetime: Duration,
    pub default_language_id: String,
    /// Must match the API's signing config so the admin can validate tokens
    /// on its own.
    pub signing: SigningConfig,
    pub retry: RetryPolicy,
}

impl AdminConfig {
    pub fn new(base_address: impl Into<String>, signing: SigningConfig) -> Self {
        Self {
            base_address: base_address.into(),
            session_lifetime: Duration::minutes(DEFAULT_SESSION_MINUTES),
            default_language_id: DEFAULT_LANGUAGE_ID.to_string(),
            signing,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Read `BASE_ADDRESS`, `SESSION_LIFETIME_MINUTES`, `DEFAULT_LANGUAGE_ID`
    /// and the `TOKENS_*` signing variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let signing = SigningConfig::from_env()?;
        let base_address = std::env::var("BASE_ADDRESS").unwrap_or_else(|_| {
            tracing::warn!(default = DEFAULT_BASE_ADDRESS, "BASE_ADDRESS not set");
            DEFAULT_BASE_ADDRESS.to_string()
        });

        let mut config = Self::new(base_address, signing);
        if let Some(minutes) = std::env::var("SESSION_LIFETIME_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|m| *m > 0)
        {
            config.session_lifetime = Duration::minutes(minutes);
        }
        if let Ok(language_id) = std::env::var("DEFAULT_LANGUAGE_ID") {
            config.default_language_id = language_id;
        }
        Ok(config)
    }
}
