use std::sync::Arc;

use chrono::Utc;

use eshop_auth::{AuthError, Hs256TokenCodec, RegisterRequest, Role, TokenAuthority};
use eshop_core::{Deadline, RetryPolicy};
use eshop_infra::{
    InMemoryCredentialStore, InMemoryProductStore, PagedQueryEngine, ProductBackend, ProductCatalog,
    UserDirectory,
};

use crate::config::{AdminSeed, ApiConfig};

#[cfg(feature = "postgres")]
use eshop_infra::PostgresProductStore;

/// Role granted to the seeded account.
pub const ADMIN_ROLE: &str = "admin";

/// Everything the route handlers share. Built once at startup.
pub struct AppServices {
    pub authority: TokenAuthority<Arc<InMemoryCredentialStore>>,
    pub users: UserDirectory,
    pub catalog: ProductCatalog,
    /// Separate validator instance for the auth middleware.
    pub validator: Arc<Hs256TokenCodec>,
}

/// Wire stores, the authority and the read services from `config`.
///
/// Credentials always live in memory. The catalog uses Postgres when the
/// `postgres` feature is on and `DATABASE_URL` is set.
pub async fn build_services(config: &ApiConfig) -> Result<AppServices, AuthError> {
    build_services_with_credentials(config, Arc::new(InMemoryCredentialStore::new())).await
}

/// Same as [`build_services`] over a caller-supplied credential store.
pub async fn build_services_with_credentials(
    config: &ApiConfig,
    credentials: Arc<InMemoryCredentialStore>,
) -> Result<AppServices, AuthError> {
    let deadline = Deadline::new(config.store_deadline);
    let retry = RetryPolicy::default();

    let authority = TokenAuthority::new(Arc::clone(&credentials), &config.signing)
        .with_deadline(deadline)
        .with_retry(retry);

    let engine = PagedQueryEngine::new().with_deadline(deadline).with_retry(retry);
    let users = UserDirectory::new(credentials.clone()).with_engine(engine);

    let catalog = ProductCatalog::new(product_backend().await?).with_resilience(deadline, retry);

    if let Some(seed) = &config.admin_seed {
        seed_admin(&authority, &credentials, seed).await?;
    }

    Ok(AppServices {
        authority,
        users,
        catalog,
        validator: Arc::new(Hs256TokenCodec::new(&config.signing)),
    })
}

#[cfg(not(feature = "postgres"))]
async fn product_backend() -> Result<Arc<dyn ProductBackend>, AuthError> {
    Ok(Arc::new(InMemoryProductStore::new()))
}

#[cfg(feature = "postgres")]
async fn product_backend() -> Result<Arc<dyn ProductBackend>, AuthError> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        tracing::warn!("DATABASE_URL not set; using in-memory product catalog");
        return Ok(Arc::new(InMemoryProductStore::new()));
    };
    let pool = sqlx::PgPool::connect(&url)
        .await
        .map_err(|e| AuthError::Unavailable(format!("failed to connect to postgres: {e}")))?;
    tracing::info!("product catalog backed by postgres");
    Ok(Arc::new(PostgresProductStore::new(pool)))
}

async fn seed_admin(
    authority: &TokenAuthority<Arc<InMemoryCredentialStore>>,
    credentials: &InMemoryCredentialStore,
    seed: &AdminSeed,
) -> Result<(), AuthError> {
    let request = RegisterRequest {
        first_name: "Admin".into(),
        last_name: "Account".into(),
        dob: chrono::NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default(),
        email: seed.email.clone(),
        phone_number: String::new(),
        user_name: seed.user_name.clone(),
        password: seed.password.clone(),
        confirm_password: seed.password.clone(),
    };
    let id = authority.register(&request, Utc::now()).await?;
    let role = Role::parse(ADMIN_ROLE)?;
    credentials
        .grant_role(id, role)
        .map_err(|e| AuthError::CreationFailed(e.to_string()))?;
    tracing::info!(user_id = %id, user_name = %seed.user_name, "admin account seeded");
    Ok(())
}
