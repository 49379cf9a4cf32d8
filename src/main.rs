use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::RwLock;
use tracing::{info, warn};

use ecogares::api::AppState;
use ecogares::sources::{LocalGeoJson, OpenDataClient, OpenDataSource, load_session};
use ecogares::{EcoGaresConfig, StationRegistry, cache, registry, telemetry, web};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => EcoGaresConfig::load_from_path(Some(PathBuf::from(path)))?,
        None => EcoGaresConfig::load()?,
    };
    telemetry::init_tracing(&config.logging)?;

    if config.cache.enabled {
        match cache::init(&config.cache.location) {
            Ok(()) => info!("Dataset cache at {}", config.cache.location),
            Err(e) => warn!("Running without dataset cache: {:#}", e),
        }
    }

    let client = OpenDataClient::new(&config.sources).context("Failed to build HTTP client")?;
    let fallback = config.sources.fallback_dir.as_ref().map(LocalGeoJson::new);
    let session = load_session(
        &client,
        fallback.as_ref().map(|f| f as &dyn OpenDataSource),
        config.cache.ttl(),
    )
    .await;

    let mut stations = StationRegistry::new(session.stations, session.datasets)
        .with_ranker(config.ranker_settings());
    stations.precompute_sync();
    let shared = Arc::new(RwLock::new(stations));

    tokio::spawn(registry::run_background(
        shared.clone(),
        config.scoring.precompute_chunk_size,
    ));

    let state = AppState {
        registry: shared,
        category_limit: config.scoring.category_limit,
    };
    let app = web::app(
        state,
        Duration::from_secs(config.server.request_timeout_seconds),
    );
    web::run(app, &config.server.host, config.server.port).await
}
