// =============================================================================
// Normalizer — Source Classification and Canonical Conversion
// =============================================================================
//
// The one place in the engine that touches untyped JSON. Recognition is by
// presence of discriminating fields, never by a `source` tag the caller
// chooses — a duck-typed payload is classified the same way no matter what
// producer sent it.
//
// Stateless and deterministic: same input always classifies and clamps the
// same way.
// =============================================================================

use serde_json::Value;

use crate::error::EngineError;
use crate::model::{EnrichedSignal, PartialTrendUpdate, PhaseEvent, StructuralSetup, TrendSnapshot};

/// The recognized source shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    SatyPhase,
    MtfDots,
    UltimateOptions,
    TradingViewSignal,
    StratExec,
    Trend,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::SatyPhase => "SATY_PHASE",
            SourceKind::MtfDots => "MTF_DOTS",
            SourceKind::UltimateOptions => "ULTIMATE_OPTIONS",
            SourceKind::TradingViewSignal => "TRADINGVIEW_SIGNAL",
            SourceKind::StratExec => "STRAT_EXEC",
            SourceKind::Trend => "TREND",
        }
    }
}

/// A payload converted to its canonical typed shape.
pub enum NormalizedEvent {
    Signal(EnrichedSignal),
    Phase(PhaseEvent),
    Trend(TrendSnapshot),
    PartialTrend(PartialTrendUpdate),
    Structural(StructuralSetup),
}

/// Classify a raw payload by the presence of discriminating fields, per §4.2.
/// Order matters: more specific shapes are checked before more general ones.
pub fn classify(value: &Value) -> Result<SourceKind, EngineError> {
    let has_path = |path: &[&str]| -> bool {
        let mut cur = value;
        for key in path {
            match cur.get(key) {
                Some(v) => cur = v,
                None => return false,
            }
        }
        true
    };

    if value
        .get("meta")
        .and_then(|m| m.get("engine"))
        .and_then(|e| e.as_str())
        == Some("SATY_PO")
    {
        return Ok(SourceKind::SatyPhase);
    }

    if has_path(&["ticker"])
        && crate::model::TrendTimeframeKey::ALL
            .iter()
            .all(|k| value.get("timeframes").and_then(|t| t.get(trend_key_str(*k))).is_some())
    {
        return Ok(SourceKind::Trend);
    }

    if has_path(&["timeframes", "tf3min"]) && has_path(&["timeframes", "tf5min"]) {
        return Ok(SourceKind::MtfDots);
    }

    if has_path(&["setup_valid"]) && has_path(&["liquidity_ok"]) && has_path(&["quality"]) {
        return Ok(SourceKind::StratExec);
    }

    if has_path(&["signal", "type"]) && has_path(&["ai_score"]) && !has_path(&["signal", "timeframe"])
    {
        return Ok(SourceKind::UltimateOptions);
    }

    if has_path(&["signal", "type"])
        && has_path(&["signal", "timeframe"])
        && has_path(&["instrument", "ticker"])
    {
        return Ok(SourceKind::TradingViewSignal);
    }

    Err(EngineError::UnknownSource)
}

fn trend_key_str(k: crate::model::TrendTimeframeKey) -> &'static str {
    use crate::model::TrendTimeframeKey::*;
    match k {
        Tf3min => "tf3min",
        Tf5min => "tf5min",
        Tf15min => "tf15min",
        Tf30min => "tf30min",
        Tf60min => "tf60min",
        Tf240min => "tf240min",
        Tf1week => "tf1week",
        Tf1month => "tf1month",
    }
}

/// Normalize a raw payload already classified as `kind`: clamp numeric
/// fields, uppercase enum strings, default missing `market_session`/
/// `timestamp`, then deserialize into the canonical type.
pub fn normalize(kind: SourceKind, mut value: Value, now_millis: i64) -> Result<NormalizedEvent, EngineError> {
    if kind == SourceKind::UltimateOptions {
        // ULTIMATE_OPTIONS carries `ai_score` at the top level (§4.2), but
        // `SignalCore::ai_score` is read from `signal.ai_score` like every
        // other source. Hoist it in before the shared deserialize.
        if let Some(ai_score) = value.get("ai_score").cloned() {
            value["signal"]["ai_score"] = ai_score;
        }
    }
    clamp_and_default(&mut value, now_millis);

    match kind {
        SourceKind::SatyPhase => {
            let phase: PhaseEvent = serde_json::from_value(value)
                .map_err(|e| EngineError::SchemaValidation(format!("SATY_PHASE: {e}")))?;
            Ok(NormalizedEvent::Phase(phase))
        }
        SourceKind::Trend => {
            let snapshot: RawTrendPayload = serde_json::from_value(value)
                .map_err(|e| EngineError::SchemaValidation(format!("TREND: {e}")))?;
            Ok(NormalizedEvent::Trend(TrendSnapshot::new(
                snapshot.ticker,
                snapshot.exchange,
                snapshot.timestamp,
                snapshot.price,
                snapshot.timeframes,
            )))
        }
        SourceKind::MtfDots => {
            let partial: PartialTrendUpdate = serde_json::from_value(value)
                .map_err(|e| EngineError::SchemaValidation(format!("MTF_DOTS: {e}")))?;
            Ok(NormalizedEvent::PartialTrend(partial))
        }
        SourceKind::StratExec => {
            let setup: StructuralSetup = serde_json::from_value(value)
                .map_err(|e| EngineError::SchemaValidation(format!("STRAT_EXEC: {e}")))?;
            Ok(NormalizedEvent::Structural(setup))
        }
        SourceKind::UltimateOptions | SourceKind::TradingViewSignal => {
            let signal: EnrichedSignal = serde_json::from_value(value)
                .map_err(|e| EngineError::SchemaValidation(format!("{}: {e}", kind.as_str())))?;
            Ok(NormalizedEvent::Signal(signal))
        }
    }
}

#[derive(serde::Deserialize)]
struct RawTrendPayload {
    ticker: String,
    #[serde(default = "default_exchange")]
    exchange: String,
    #[serde(default)]
    timestamp: i64,
    price: f64,
    timeframes: std::collections::HashMap<crate::model::TrendTimeframeKey, crate::model::TrendTimeframeState>,
}

fn default_exchange() -> String {
    "UNKNOWN".to_string()
}

/// Clamp known numeric fields, uppercase known enum-string fields, and
/// default `time_context.market_session`/`signal.timestamp` in place.
fn clamp_and_default(value: &mut Value, now_millis: i64) {
    if let Some(ai_score) = value.pointer("/signal/ai_score").and_then(|v| v.as_f64()) {
        set_f64(value, "/signal/ai_score", ai_score.clamp(0.0, 10.5));
    }
    if let Some(phase) = value.pointer("/confidence/raw_strength").and_then(|v| v.as_f64()) {
        set_f64(value, "/confidence/raw_strength", phase.clamp(-100.0, 100.0));
    }

    uppercase_in_place(value, "/signal/type");
    uppercase_in_place(value, "/signal/quality");

    if value.get("signal").is_some() {
        if value.get("time_context").is_none() {
            value["time_context"] = serde_json::json!({});
        }
        if value["time_context"].get("market_session").is_none() {
            value["time_context"]["market_session"] = Value::String("OPEN".to_string());
        }
        if value["time_context"].get("day_of_week").is_none() {
            value["time_context"]["day_of_week"] = Value::String("MONDAY".to_string());
        }
    }

    if let Some(signal) = value.get_mut("signal") {
        if signal.get("timestamp").and_then(|v| v.as_i64()).is_none() {
            signal["timestamp"] = serde_json::json!(now_millis);
        }
        if signal.get("bar_time").and_then(|v| v.as_i64()).is_none() {
            signal["bar_time"] = serde_json::json!(now_millis);
        }
        // ULTIMATE_OPTIONS payloads carry no timeframe (§4.2); default to
        // the shortest recognized one so the shared EnrichedSignal shape
        // still deserializes.
        if signal.get("timeframe").and_then(|v| v.as_u64()).is_none() {
            signal["timeframe"] = serde_json::json!(5);
        }
    }
}

fn set_f64(value: &mut Value, pointer: &str, new_val: f64) {
    if let Some(slot) = value.pointer_mut(pointer) {
        *slot = serde_json::json!(new_val);
    }
}

fn uppercase_in_place(value: &mut Value, pointer: &str) {
    if let Some(s) = value.pointer(pointer).and_then(|v| v.as_str()) {
        let upper = s.to_uppercase();
        if let Some(slot) = value.pointer_mut(pointer) {
            *slot = Value::String(upper);
        }
    }
}
