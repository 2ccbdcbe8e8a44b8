//! Server configuration, read once from the environment at startup.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use eshop_auth::{ConfigError, SigningConfig};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_STORE_DEADLINE_MS: u64 = 5_000;
const DEV_SIGNING_KEY: &str = "dev-only-signing-key-change-me-0000000000";
const DEV_ISSUER: &str = "https://localhost:5001";

#[derive(Debug, Error)]
pub enum ApiConfigError {
    #[error(transparent)]
    Signing(#[from] ConfigError),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Account created at startup so a fresh in-memory server can be logged into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub user_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub store_deadline: Duration,
    pub signing: SigningConfig,
    pub admin_seed: Option<AdminSeed>,
}

impl ApiConfig {
    /// Config for in-process servers (tests, local tooling).
    pub fn new(signing: SigningConfig) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            store_deadline: Duration::from_millis(DEFAULT_STORE_DEADLINE_MS),
            signing,
            admin_seed: None,
        }
    }

    pub fn with_admin_seed(mut self, seed: AdminSeed) -> Self {
        self.admin_seed = Some(seed);
        self
    }

    /// Read `API_BIND_ADDR`, `STORE_DEADLINE_MS`, the `TOKENS_*` signing
    /// variables and the optional `ADMIN_SEED_*` account.
    pub fn from_env() -> Result<Self, ApiConfigError> {
        let bind_addr = env_or("API_BIND_ADDR", DEFAULT_BIND_ADDR);
        let bind_addr = bind_addr.parse().map_err(|_| ApiConfigError::Invalid {
            name: "API_BIND_ADDR",
            value: bind_addr.clone(),
        })?;

        let deadline_ms = env_or("STORE_DEADLINE_MS", &DEFAULT_STORE_DEADLINE_MS.to_string());
        let deadline_ms: u64 = deadline_ms.parse().map_err(|_| ApiConfigError::Invalid {
            name: "STORE_DEADLINE_MS",
            value: deadline_ms.clone(),
        })?;

        let signing = match SigningConfig::from_env() {
            Ok(signing) => signing,
            Err(ConfigError::Missing(name)) => {
                tracing::warn!(missing = name, "signing config not set; using insecure dev default");
                SigningConfig::new(DEV_SIGNING_KEY, DEV_ISSUER, DEV_ISSUER)?
            }
            Err(e) => return Err(e.into()),
        };

        let admin_seed = match (
            std::env::var("ADMIN_SEED_USER"),
            std::env::var("ADMIN_SEED_EMAIL"),
            std::env::var("ADMIN_SEED_PASSWORD"),
        ) {
            (Ok(user_name), Ok(email), Ok(password)) => Some(AdminSeed {
                user_name,
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            bind_addr,
            store_deadline: Duration::from_millis(deadline_ms),
            signing,
            admin_seed,
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
