//! Imagery Server - dated satellite imagery cache
//!
//! Fetches one image per day for a fixed bounding box from an upstream
//! provider, keeps them in the on-disk imagery cache, and serves the cached
//! timeline over HTTP.

mod config;
mod error;
mod provider;
mod server;
mod sync;
mod types;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::provider::HttpImageryProvider;
use crate::server::{start_server, ServerState, SharedState};
use imagery_cache::{ReferenceStrategy, Repository};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("imagery_server=info".parse()?)
        .add_directive("imagery_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Imagery Server...");

    let config = ServerConfig::from_env()?;
    info!("Port: {}", config.port);
    info!("Cache dir: {:?}", config.repository.cache_dir);
    info!("Bounding box: {}", config.repository.default_bounding_box);
    info!("Minimum image size: {} bytes", config.repository.min_image_bytes);
    info!("Provider: {}", config.provider_url);
    match &config.repository.references {
        ReferenceStrategy::StaticPath { prefix } => info!("References: static path {}", prefix),
        ReferenceStrategy::DataUrl => info!("References: inline data URLs"),
    }

    let repo = Repository::new(config.repository);
    repo.init().await;

    let provider = HttpImageryProvider::new(config.provider_url, config.provider_token)?;

    let state: SharedState = Arc::new(ServerState::new(
        repo,
        Arc::new(provider),
        config.fetch_concurrency,
    ));

    // Start HTTP server (blocking)
    start_server(state, config.port).await?;

    Ok(())
}
