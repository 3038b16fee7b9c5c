/// Main application entry point with clean architecture
mod analysis;
mod cache;
mod clients;
mod config;
mod domain;
mod errors;
mod handlers;
mod repo;
mod routes;
mod services;
mod utils;

#[cfg(test)]
mod test_support;

use crate::cache::SatelliteCache;
use crate::clients::EosdaClient;
use crate::config::{AppConfig, FeatureFlag};
use crate::handlers::AppState;
use crate::repo::PgFieldRepo;
use crate::routes::build_router;
use crate::services::SoilAnalysisService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    // Load configuration
    let config = AppConfig::from_env()?;
    info!("Configuration loaded successfully");
    for flag in FeatureFlag::ALL {
        if !config.flags.is_enabled(flag) {
            warn!("Feature {} is disabled", flag.env_key());
        }
    }

    // Initialize database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    info!("Database connection pool established");

    // Initialize repository, client and cache
    let fields = Arc::new(PgFieldRepo::new(pool));
    let eosda = EosdaClient::new(config.eosda.clone())?;
    if eosda.is_synthetic() {
        warn!("EOSDA is not configured, serving synthetic satellite data");
    }
    let cache = SatelliteCache::new(&config.cache);

    // Initialize services
    let soil_service = Arc::new(SoilAnalysisService::new(
        fields,
        Arc::new(eosda),
        cache.clone(),
        config.flags.satellite_cache,
    ));

    // Initialize application state
    let state = AppState {
        soil_service,
        flags: config.flags,
    };

    // Start background tasks
    start_background_tasks(&config, cache);

    // Build router
    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("soil_automation service listening on {}", config.bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Start background maintenance tasks
fn start_background_tasks(config: &AppConfig, cache: SatelliteCache) {
    let interval = config.cache.sweep_every;

    // Background task: drop expired snapshots
    tokio::spawn(async move {
        info!(
            "Starting satellite cache sweep (interval: {}s, ttl: {}s)",
            interval.as_secs(),
            cache.ttl().as_secs()
        );
        loop {
            tokio::time::sleep(interval).await;
            let purged = cache.purge_expired();
            if purged > 0 {
                debug!(
                    "Purged {} expired satellite snapshots, {} cached",
                    purged,
                    cache.len()
                );
            }
        }
    });

    info!("All background tasks started successfully");
}
