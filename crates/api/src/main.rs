use std::sync::Arc;

use anyhow::Context;

use eshop_api::{ApiConfig, build_app, build_services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    eshop_observability::init();

    let config = ApiConfig::from_env().context("invalid api configuration")?;
    let services = build_services(&config)
        .await
        .context("failed to build services")?;
    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
