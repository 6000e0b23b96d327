// =============================================================================
// Webhook Handlers — §6 Ingest Routes
// =============================================================================
//
// One handler per route; each accepts the producer's raw shape, classifies
// it via `normalizer::classify` (ignoring the route path as a hint — a
// payload is recognized by its own fields, per §4.2), normalizes, and
// routes the canonical record into the matching store. Every call records
// a `ReceiptEntry` in the audit log, accepted or not.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::audit::ReceiptEntry;
use crate::error::EngineError;
use crate::model::{StoredPhase, StoredSignal, StoredTrend};
use crate::normalizer::{self, NormalizedEvent};
use crate::stores::{PhaseKey, TimeframeKey};

use super::ApiState;

#[derive(Serialize)]
struct AcceptedResponse {
    success: bool,
    source: String,
    processing_time_ms: u128,
    request_id: String,
    engine_version: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    details: Option<String>,
}

fn error_response(err: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorResponse {
        error: err.code(),
        message: err.to_string(),
        details: None,
    };
    (status, Json(body))
}

fn accepted(request_id: String, source: &str, elapsed_ms: u128) -> Json<AcceptedResponse> {
    Json(AcceptedResponse {
        success: true,
        source: source.to_string(),
        processing_time_ms: elapsed_ms,
        request_id,
        engine_version: crate::config::ENGINE_VERSION.to_string(),
    })
}

fn mismatch(expected: &[&str], got: &str) -> EngineError {
    EngineError::SchemaValidation(format!(
        "expected one of {expected:?}, classified as {got}"
    ))
}

/// `POST /webhooks/signals` — TRADINGVIEW_SIGNAL or ULTIMATE_OPTIONS.
pub async fn signals(
    State(state): State<Arc<ApiState>>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let started = Instant::now();
    let req_id = Uuid::new_v4().to_string();
    let now = state.engine.clock.now_millis();

    let kind = match normalizer::classify(&payload) {
        Ok(k) if matches!(k.as_str(), "TRADINGVIEW_SIGNAL" | "ULTIMATE_OPTIONS") => k,
        Ok(other) => return error_response(mismatch(&["TRADINGVIEW_SIGNAL", "ULTIMATE_OPTIONS"], other.as_str())).into_response(),
        Err(err) => return error_response(err).into_response(),
    };

    match normalizer::normalize(kind, payload, now) {
        Ok(NormalizedEvent::Signal(signal)) => {
            let key = TimeframeKey {
                ticker: signal.instrument.ticker.clone(),
                timeframe: signal.signal.timeframe,
            };
            state.timeframe_store.put(key, StoredSignal::new(signal, now));

            state.audit_log.record_receipt(ReceiptEntry {
                request_id: req_id.clone(),
                source: kind.as_str().to_string(),
                accepted: true,
                message: "accepted".to_string(),
                received_at: now,
            });
            accepted(req_id, kind.as_str(), started.elapsed().as_millis()).into_response()
        }
        Ok(_) => error_response(EngineError::Internal("unexpected normalized shape".to_string())).into_response(),
        Err(err) => {
            state.audit_log.record_receipt(ReceiptEntry {
                request_id: req_id,
                source: kind.as_str().to_string(),
                accepted: false,
                message: err.to_string(),
                received_at: now,
            });
            error_response(err).into_response()
        }
    }
}

/// `POST /webhooks/saty-phase` — SATY_PHASE regime events.
pub async fn saty_phase(
    State(state): State<Arc<ApiState>>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let started = Instant::now();
    let req_id = Uuid::new_v4().to_string();
    let now = state.engine.clock.now_millis();

    let kind = match normalizer::classify(&payload) {
        Ok(k) if k.as_str() == "SATY_PHASE" => k,
        Ok(other) => return error_response(mismatch(&["SATY_PHASE"], other.as_str())).into_response(),
        Err(err) => return error_response(err).into_response(),
    };

    match normalizer::normalize(kind, payload, now) {
        Ok(NormalizedEvent::Phase(phase)) => {
            let key = PhaseKey {
                ticker: phase.instrument.ticker.clone(),
                tf_role: phase.timeframe.tf_role,
            };
            state.phase_store.put(key, StoredPhase::new(phase, now));

            state.audit_log.record_receipt(ReceiptEntry {
                request_id: req_id.clone(),
                source: "SATY_PHASE".to_string(),
                accepted: true,
                message: "accepted".to_string(),
                received_at: now,
            });
            accepted(req_id, "SATY_PHASE", started.elapsed().as_millis()).into_response()
        }
        Ok(_) => error_response(EngineError::Internal("unexpected normalized shape".to_string())).into_response(),
        Err(err) => {
            state.audit_log.record_receipt(ReceiptEntry {
                request_id: req_id,
                source: "SATY_PHASE".to_string(),
                accepted: false,
                message: err.to_string(),
                received_at: now,
            });
            error_response(err).into_response()
        }
    }
}

/// `POST /webhooks/trend` — full 8-timeframe TREND snapshots, and MTF_DOTS
/// partial 3M/5M updates (both feed trend context, at different fidelity).
pub async fn trend(
    State(state): State<Arc<ApiState>>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let started = Instant::now();
    let req_id = Uuid::new_v4().to_string();
    let now = state.engine.clock.now_millis();

    let kind = match normalizer::classify(&payload) {
        Ok(k) if matches!(k.as_str(), "TREND" | "MTF_DOTS") => k,
        Ok(other) => return error_response(mismatch(&["TREND", "MTF_DOTS"], other.as_str())).into_response(),
        Err(err) => return error_response(err).into_response(),
    };

    let result = normalizer::normalize(kind, payload, now);
    match result {
        Ok(NormalizedEvent::Trend(snapshot)) => {
            let ticker = snapshot.ticker.clone();
            state.trend_store.put(ticker, StoredTrend::new(snapshot, now));
        }
        Ok(NormalizedEvent::PartialTrend(update)) => {
            state.context_store.merge_partial_trend(&update.ticker.clone(), update);
        }
        Ok(_) => return error_response(EngineError::Internal("unexpected normalized shape".to_string())).into_response(),
        Err(err) => {
            state.audit_log.record_receipt(ReceiptEntry {
                request_id: req_id,
                source: kind.as_str().to_string(),
                accepted: false,
                message: err.to_string(),
                received_at: now,
            });
            return error_response(err).into_response();
        }
    }

    state.audit_log.record_receipt(ReceiptEntry {
        request_id: req_id.clone(),
        source: kind.as_str().to_string(),
        accepted: true,
        message: "accepted".to_string(),
        received_at: now,
    });
    accepted(req_id, kind.as_str(), started.elapsed().as_millis()).into_response()
}

/// `POST /webhooks/strat-exec` — structural setup confirmation.
pub async fn strat_exec(
    State(state): State<Arc<ApiState>>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let started = Instant::now();
    let req_id = Uuid::new_v4().to_string();
    let now = state.engine.clock.now_millis();

    let kind = match normalizer::classify(&payload) {
        Ok(k) if k.as_str() == "STRAT_EXEC" => k,
        Ok(other) => return error_response(mismatch(&["STRAT_EXEC"], other.as_str())).into_response(),
        Err(err) => return error_response(err).into_response(),
    };

    match normalizer::normalize(kind, payload, now) {
        Ok(NormalizedEvent::Structural(setup)) => {
            state.context_store.merge_structural(setup);

            state.audit_log.record_receipt(ReceiptEntry {
                request_id: req_id.clone(),
                source: "STRAT_EXEC".to_string(),
                accepted: true,
                message: "accepted".to_string(),
                received_at: now,
            });
            accepted(req_id, "STRAT_EXEC", started.elapsed().as_millis()).into_response()
        }
        Ok(_) => error_response(EngineError::Internal("unexpected normalized shape".to_string())).into_response(),
        Err(err) => {
            state.audit_log.record_receipt(ReceiptEntry {
                request_id: req_id,
                source: "STRAT_EXEC".to_string(),
                accepted: false,
                message: err.to_string(),
                received_at: now,
            });
            error_response(err).into_response()
        }
    }
}
