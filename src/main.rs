// =============================================================================
// confluence-engine — Main Entry Point
// =============================================================================
//
// Thin wiring layer: load config, build the stores and the market-context
// builder, construct the engine, start the axum server. All decision logic
// lives in the library crate.
// =============================================================================

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use confluence_engine::api::{self, ApiState};
use confluence_engine::audit::AuditLog;
use confluence_engine::clock::SystemClock;
use confluence_engine::config::ConfigRegistry;
use confluence_engine::engine::DecisionEngine;
use confluence_engine::market_context::MarketContextBuilder;
use confluence_engine::rng::DeterministicRng;
use confluence_engine::stores::{ContextStore, PhaseStore, TimeframeStore, TrendStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("confluence-engine starting up");

    let config = match std::env::var("CONFLUENCE_CONFIG_PATH") {
        Ok(path) => match std::fs::read_to_string(&path) {
            Ok(raw) => ConfigRegistry::load_from_json(&raw).unwrap_or_else(|e| {
                warn!(error = %e, path, "failed to parse config override, using defaults");
                ConfigRegistry::default_frozen()
            }),
            Err(e) => {
                warn!(error = %e, path, "failed to read config override, using defaults");
                ConfigRegistry::default_frozen()
            }
        },
        Err(_) => ConfigRegistry::default_frozen(),
    };
    let config = Arc::new(config);
    info!(config_hash = config.config_hash(), "configuration frozen");

    let base_url = std::env::var("CONFLUENCE_PROVIDER_BASE_URL")
        .unwrap_or_else(|_| "https://example.invalid".to_string());
    let market_context_builder = Arc::new(MarketContextBuilder::from_keys(
        std::env::var("CONFLUENCE_OPTIONS_API_KEY").ok(),
        std::env::var("CONFLUENCE_STATS_API_KEY").ok(),
        std::env::var("CONFLUENCE_LIQUIDITY_API_KEY").ok(),
        &base_url,
        &config,
        DeterministicRng::from_entropy(),
    ));

    let timeframe_store = Arc::new(TimeframeStore::new());
    let phase_store = Arc::new(PhaseStore::new());
    let trend_store = Arc::new(TrendStore::new());
    let context_store = Arc::new(ContextStore::new());
    let audit_log = Arc::new(AuditLog::new());

    let engine = Arc::new(DecisionEngine::new(
        timeframe_store.clone(),
        phase_store.clone(),
        trend_store.clone(),
        context_store.clone(),
        market_context_builder,
        audit_log.clone(),
        config.clone(),
        Arc::new(SystemClock),
    ));

    let api_state = Arc::new(ApiState {
        engine,
        timeframe_store,
        phase_store,
        trend_store,
        context_store,
        audit_log,
        config,
    });

    let bind_addr = std::env::var("CONFLUENCE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let app = api::router(api_state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
