// =============================================================================
// API — Thin Axum Surface Over The Decision Core (§6)
// =============================================================================
//
// Exercises the wire contracts documented in §6: four webhook POST routes
// and three read-only GET routes. Deliberately minimal — no auth
// middleware, no rate limiting, no persistence — those remain external
// collaborators per the Non-goals. The teacher's `api::rest` carries a full
// `AuthBearer` + permissive-CORS production surface; this module keeps only
// the CORS layer from that idiom since auth/rate-limiting are explicitly
// out of scope here.
// =============================================================================

pub mod queries;
pub mod webhooks;

use std::sync::Arc;

use axum::{routing::{get, post}, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::audit::AuditLog;
use crate::config::ConfigRegistry;
use crate::engine::DecisionEngine;
use crate::stores::{ContextStore, PhaseStore, TimeframeStore, TrendStore};

/// Shared state for the demo API layer.
pub struct ApiState {
    pub engine: Arc<DecisionEngine>,
    pub timeframe_store: Arc<TimeframeStore>,
    pub phase_store: Arc<PhaseStore>,
    pub trend_store: Arc<TrendStore>,
    pub context_store: Arc<ContextStore>,
    pub audit_log: Arc<AuditLog>,
    pub config: Arc<ConfigRegistry>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/webhooks/signals", post(webhooks::signals))
        .route("/webhooks/saty-phase", post(webhooks::saty_phase))
        .route("/webhooks/trend", post(webhooks::trend))
        .route("/webhooks/strat-exec", post(webhooks::strat_exec))
        .route("/signals/current", get(queries::signals_current))
        .route("/phase/current", get(queries::phase_current))
        .route("/trend/current", get(queries::trend_current))
        .layer(cors)
        .with_state(state)
}
