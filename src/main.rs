//! Updock server entry point.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use updock_lib::engine::{
    api::{create_router, ApiState},
    config::Config,
    storage::S3ObjectStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;
    let store = S3ObjectStore::new(&config.s3).context("building storage client")?;
    let app = create_router(ApiState::new(Arc::new(store)));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(%addr, bucket = %config.s3.bucket, endpoint = %config.s3.endpoint, "updock listening");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
