// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Season Leaderboard API Server
//!
//! Serves per-activity distance leaderboards for a fitness season, built
//! from baseline totals and workout records on the event network.

use season_leaderboard::{
    config::{Config, StoreBackend},
    db::{DurableStore, FirestoreDb, MemoryStore},
    services::{
        CacheService, EventGateway, LeaderboardService, ParticipantRegistry, RefreshSettings,
        RelayPool, Season,
    },
    time_utils::{format_unix_rfc3339, Clock, SystemClock},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Season Leaderboard API");

    // Initialize the durable store
    let store: Arc<dyn DurableStore> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; cache and joins are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Load roster, charities, and baselines
    tracing::info!(path = %config.season_data_path, "Loading season data");
    let season = Arc::new(Season::load_from_file(&config.season_data_path)?);
    tracing::info!(
        season = %season.id,
        starts_at = %format_unix_rfc3339(season.window.since),
        ends_at = %format_unix_rfc3339(season.window.until),
        "Season data loaded"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Cache service owns the background writer until shutdown
    let cache = Arc::new(CacheService::start(
        store.clone(),
        clock.clone(),
        season.baseline.version(),
    ));

    // Local joins are mirrored in memory for the fast path
    let registry = ParticipantRegistry::new(season.roster.clone(), store, clock.clone());
    match registry.load().await {
        Ok(count) => tracing::info!(count, "Local joins loaded"),
        Err(e) => tracing::warn!(error = %e, "Failed to load local joins, starting empty"),
    }

    // Event network access
    if config.relay_urls.is_empty() {
        tracing::warn!("No relays configured; leaderboards will show baseline totals only");
    }
    let relays = Arc::new(RelayPool::new(
        config.relay_urls.clone(),
        config.relay_connect_timeout,
    ));
    let gateway = EventGateway::new(
        relays,
        config.workout_event_kind,
        config.fetch_result_limit,
    );

    let leaderboards = LeaderboardService::new(
        season,
        registry,
        gateway,
        cache.clone(),
        clock,
        RefreshSettings {
            fetch_timeout: config.fetch_timeout,
            ttl_secs: config.cache_ttl_secs,
        },
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        leaderboards,
    });

    // Build router
    let app = season_leaderboard::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let queued cache writes land before exiting
    cache.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("season_leaderboard=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
