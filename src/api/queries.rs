// =============================================================================
// Read-Only Query Handlers — §6
// =============================================================================

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::model::PhaseName;

use super::ApiState;

#[derive(Deserialize)]
pub struct TickerQuery {
    ticker: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

fn not_found(ticker: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "NOT_FOUND",
            message: format!("no data for ticker {ticker}"),
        }),
    )
}

#[derive(Serialize)]
struct SignalSummary {
    timeframe: u16,
    direction: &'static str,
    ai_score: f64,
    quality: String,
    received_at: i64,
    expires_at: i64,
}

#[derive(Serialize)]
struct SignalsCurrentResponse {
    ticker: String,
    signals: Vec<SignalSummary>,
    engine_version: String,
    config_hash: String,
}

/// `GET /signals/current?ticker=SPY` — active signals, 4H -> 3M.
pub async fn signals_current(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<TickerQuery>,
) -> impl IntoResponse {
    let now = state.engine.clock.now_millis();
    let mut active = state.timeframe_store.active(&q.ticker, now);
    active.sort_by(|(a, _), (b, _)| b.minutes().cmp(&a.minutes()));

    let signals = active
        .into_iter()
        .map(|(tf, stored)| SignalSummary {
            timeframe: tf.minutes(),
            direction: stored.signal.signal.signal_type.as_str(),
            ai_score: stored.signal.signal.ai_score,
            quality: format!("{:?}", stored.signal.signal.quality).to_uppercase(),
            received_at: stored.received_at,
            expires_at: stored.expires_at,
        })
        .collect();

    Json(SignalsCurrentResponse {
        ticker: q.ticker,
        signals,
        engine_version: crate::config::ENGINE_VERSION.to_string(),
        config_hash: state.config.config_hash().to_string(),
    })
    .into_response()
}

#[derive(Serialize)]
struct PhaseSummary {
    tf_role: String,
    phase_name: Option<PhaseName>,
    confidence_score: f64,
    htf_alignment: bool,
    allowed_directions: Vec<String>,
}

#[derive(Serialize)]
struct RegimeSummary {
    local_bias: String,
    htf_bias: String,
    macro_bias: String,
    bullish_pct: f64,
    bearish_pct: f64,
}

#[derive(Serialize)]
struct PhaseCurrentResponse {
    ticker: String,
    regime: RegimeSummary,
    phases: Vec<PhaseSummary>,
    engine_version: String,
    config_hash: String,
}

/// `GET /phase/current?ticker=SPY` — regime context, alignment summary, and
/// per-role phases.
pub async fn phase_current(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<TickerQuery>,
) -> impl IntoResponse {
    let now = state.engine.clock.now_millis();
    let active = state.phase_store.active(&q.ticker, now);
    if active.is_empty() {
        return not_found(&q.ticker).into_response();
    }

    let regime_context = active[0].1.phase.regime_context.clone();
    let bullish = active
        .iter()
        .filter(|(_, stored)| stored.phase.regime_context.local_bias == crate::model::LocalBias::Bullish)
        .count();
    let bearish = active
        .iter()
        .filter(|(_, stored)| stored.phase.regime_context.local_bias == crate::model::LocalBias::Bearish)
        .count();
    let total = active.len() as f64;
    let regime = RegimeSummary {
        local_bias: format!("{:?}", regime_context.local_bias).to_uppercase(),
        htf_bias: format!("{:?}", regime_context.htf_bias).to_uppercase(),
        macro_bias: format!("{:?}", regime_context.macro_bias).to_uppercase(),
        bullish_pct: 100.0 * bullish as f64 / total,
        bearish_pct: 100.0 * bearish as f64 / total,
    };

    let phases = active
        .into_iter()
        .map(|(role, stored)| PhaseSummary {
            tf_role: format!("{role:?}").to_uppercase(),
            phase_name: crate::gates::phase_name_from_event(&stored.phase.event.name),
            confidence_score: stored.phase.confidence.confidence_score,
            htf_alignment: stored.phase.confidence.htf_alignment,
            allowed_directions: stored
                .phase
                .execution_guidance
                .allowed_directions
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        })
        .collect();

    Json(PhaseCurrentResponse {
        ticker: q.ticker,
        regime,
        phases,
        engine_version: crate::config::ENGINE_VERSION.to_string(),
        config_hash: state.config.config_hash().to_string(),
    })
    .into_response()
}

#[derive(Serialize)]
struct TrendCurrentResponse {
    ticker: String,
    price: f64,
    alignment_score: f64,
    alignment_strength: String,
    dominant_direction: String,
    ttl_minutes: i64,
    active_tickers: usize,
    last_update: i64,
    engine_version: String,
    config_hash: String,
}

/// `GET /trend/current?ticker=SPY` — trend snapshot with alignment block.
pub async fn trend_current(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<TickerQuery>,
) -> impl IntoResponse {
    let now = state.engine.clock.now_millis();
    let Some(stored) = state.trend_store.get(&q.ticker, now) else {
        return not_found(&q.ticker).into_response();
    };
    let active_tickers = state.trend_store.active_count(now);

    Json(TrendCurrentResponse {
        ticker: stored.snapshot.ticker.clone(),
        price: stored.snapshot.price,
        alignment_score: stored.snapshot.alignment.score,
        alignment_strength: format!("{:?}", stored.snapshot.alignment.strength).to_uppercase(),
        dominant_direction: format!("{:?}", stored.snapshot.alignment.dominant_direction).to_uppercase(),
        ttl_minutes: crate::model::TREND_TTL_MINUTES,
        active_tickers,
        last_update: stored.received_at,
        engine_version: crate::config::ENGINE_VERSION.to_string(),
        config_hash: state.config.config_hash().to_string(),
    })
    .into_response()
}

