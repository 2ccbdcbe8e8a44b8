//! Command-line admin: signs in, opens a session and lists the first page of
//! the catalog and the user directory.

use anyhow::Context;
use chrono::Utc;

use eshop_admin::{AdminConfig, BaseApiClient, ProductApiClient, SessionStore, UserApiClient};
use eshop_auth::LoginRequest;
use eshop_core::PageRequest;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    eshop_observability::init();

    let config = AdminConfig::from_env().context("invalid admin configuration")?;
    let user_name = std::env::var("ADMIN_USER").context("ADMIN_USER is not set")?;
    let password = std::env::var("ADMIN_PASSWORD").context("ADMIN_PASSWORD is not set")?;

    let base = BaseApiClient::from_config(&config);
    let token = UserApiClient::new(base.clone())
        .authenticate(&LoginRequest::new(user_name, password))
        .await
        .context("sign-in failed")?;

    let sessions = SessionStore::new(&config.signing, config.session_lifetime);
    let session_id = sessions
        .login(token, config.default_language_id.clone(), Utc::now())
        .context("api returned a token this admin cannot validate")?;
    let session = sessions
        .get(&session_id, Utc::now())
        .context("session expired immediately")?;

    let authed = base.with_token(session.token.clone());
    let first_page = PageRequest::new(1, 10)?.with_language(session.language_id.clone());

    let products = ProductApiClient::new(authed.clone())
        .get_product_pagings(&first_page)
        .await?;
    tracing::info!(
        total = products.total_records,
        language_id = %session.language_id,
        "catalog"
    );
    for p in &products.items {
        tracing::info!(product_id = %p.id, name = %p.name, price = p.price, "product");
    }

    let users = UserApiClient::new(authed)
        .get_users_paging(&PageRequest::new(1, 10)?)
        .await?;
    tracing::info!(total = users.total_records, "user directory");
    for u in &users.items {
        tracing::info!(user_id = %u.id, user_name = %u.user_name, "user");
    }

    sessions.logout(&session_id);
    Ok(())
}
