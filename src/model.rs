// =============================================================================
// Data Model
// =============================================================================
//
// The canonical typed records the rest of the engine operates on. Only
// `normalizer` ever sees untyped JSON; everything downstream of it reads
// and writes these types.
// =============================================================================

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::session::{DayOfWeek, MarketSession};

// =============================================================================
// Small enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }
}

/// Signal timeframe in minutes. Only these six values are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[repr(u16)]
pub enum Timeframe {
    Tf3 = 3,
    Tf5 = 5,
    Tf15 = 15,
    Tf30 = 30,
    Tf60 = 60,
    Tf240 = 240,
}

impl Timeframe {
    pub const ALL: [Timeframe; 6] = [
        Timeframe::Tf3,
        Timeframe::Tf5,
        Timeframe::Tf15,
        Timeframe::Tf30,
        Timeframe::Tf60,
        Timeframe::Tf240,
    ];

    /// Priority order for entry-signal selection: 240 -> 60 -> 30 -> 15 -> 5 -> 3.
    pub const PRIORITY: [Timeframe; 6] = [
        Timeframe::Tf240,
        Timeframe::Tf60,
        Timeframe::Tf30,
        Timeframe::Tf15,
        Timeframe::Tf5,
        Timeframe::Tf3,
    ];

    pub fn minutes(self) -> u16 {
        self as u16
    }

    pub fn from_minutes(m: u16) -> Option<Timeframe> {
        Timeframe::ALL.into_iter().find(|tf| tf.minutes() == m)
    }

    /// `validity_minutes` for a `StoredSignal` on this timeframe, per §3.
    pub fn validity_minutes(self) -> i64 {
        match self {
            Timeframe::Tf3 => 6,
            Timeframe::Tf5 => 10,
            Timeframe::Tf15 => 30,
            Timeframe::Tf30 => 60,
            Timeframe::Tf60 => 120,
            Timeframe::Tf240 => 480,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Quality {
    Extreme,
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CandleDirection {
    Green,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendAlignment {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GammaBias {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContextSource {
    Api,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PhaseName {
    Accumulation,
    Markup,
    Distribution,
    Markdown,
}

impl PhaseName {
    /// Regime gate's allowed directions per phase (§4.7).
    pub fn allowed_directions(self) -> &'static [Side] {
        match self {
            PhaseName::Accumulation => &[Side::Long, Side::Short],
            PhaseName::Markup => &[Side::Long],
            PhaseName::Distribution => &[],
            PhaseName::Markdown => &[Side::Short],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Volatility {
    Low,
    Normal,
    High,
    Extreme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionQuality {
    A,
    B,
    C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    RegimePhaseEntry,
    RegimePhaseExit,
    RegimeReversal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectionalImplication {
    UpsidePotential,
    DownsidePotential,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TfRole {
    Regime,
    Bias,
    SetupFormation,
    Structural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LocalBias {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignmentStrength {
    Strong,
    Moderate,
    Weak,
    Choppy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Execute,
    Wait,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HtfAlignment {
    Perfect,
    Good,
    Weak,
    Counter,
}

/// Timeframe keys used by `TrendSnapshot.timeframes`, distinct from
/// `Timeframe` because it includes weekly/monthly buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendTimeframeKey {
    Tf3min,
    Tf5min,
    Tf15min,
    Tf30min,
    Tf60min,
    Tf240min,
    Tf1week,
    Tf1month,
}

impl TrendTimeframeKey {
    pub const ALL: [TrendTimeframeKey; 8] = [
        TrendTimeframeKey::Tf3min,
        TrendTimeframeKey::Tf5min,
        TrendTimeframeKey::Tf15min,
        TrendTimeframeKey::Tf30min,
        TrendTimeframeKey::Tf60min,
        TrendTimeframeKey::Tf240min,
        TrendTimeframeKey::Tf1week,
        TrendTimeframeKey::Tf1month,
    ];
}

// =============================================================================
// EnrichedSignal and nested payload records
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalCore {
    #[serde(rename = "type")]
    pub signal_type: Side,
    pub timeframe: Timeframe,
    pub quality: Quality,
    pub ai_score: f64,
    pub timestamp: i64,
    pub bar_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub exchange: String,
    pub ticker: String,
    pub current_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPlan {
    pub price: f64,
    pub stop_loss: f64,
    pub target_1: f64,
    pub target_2: f64,
    pub stop_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPlan {
    pub amount: f64,
    pub rr_ratio_t1: f64,
    pub rr_ratio_t2: f64,
    pub stop_distance_pct: f64,
    pub recommended_shares: f64,
    pub recommended_contracts: u32,
    pub position_multiplier: f64,
    pub account_risk_pct: f64,
    pub max_loss_dollars: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalMarketContext {
    pub vwap: f64,
    pub pmh: f64,
    pub pml: f64,
    pub day_open: f64,
    pub day_change_pct: f64,
    pub price_vs_vwap_pct: f64,
    pub distance_to_pmh: f64,
    pub distance_to_pml: f64,
    pub atr: f64,
    pub volume_vs_avg: f64,
    pub candle_direction: CandleDirection,
    pub candle_size_atr: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendContext {
    pub ema_8: f64,
    pub ema_21: f64,
    pub ema_50: f64,
    pub alignment: TrendAlignment,
    pub strength: f64,
    pub rsi: f64,
    pub macd_signal: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MtfContext {
    #[serde(rename = "4h_bias")]
    pub h4_bias: Side,
    #[serde(rename = "4h_rsi")]
    pub h4_rsi: f64,
    #[serde(rename = "1h_bias")]
    pub h1_bias: Side,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub strat: f64,
    pub trend: f64,
    pub gamma: f64,
    pub vwap: f64,
    pub mtf: f64,
    pub golf: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeContext {
    pub market_session: MarketSession,
    pub day_of_week: DayOfWeek,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedSignal {
    pub signal: SignalCore,
    pub instrument: Instrument,
    pub entry: EntryPlan,
    pub risk: RiskPlan,
    pub market_context: SignalMarketContext,
    pub trend: TrendContext,
    pub mtf_context: MtfContext,
    pub score_breakdown: ScoreBreakdown,
    pub time_context: TimeContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSignal {
    pub signal: EnrichedSignal,
    pub received_at: i64,
    pub expires_at: i64,
    pub validity_minutes: i64,
}

impl StoredSignal {
    pub fn new(signal: EnrichedSignal, received_at: i64) -> Self {
        let validity_minutes = signal.signal.timeframe.validity_minutes();
        let expires_at = received_at + validity_minutes * 60 * 1000;
        Self {
            signal,
            received_at,
            expires_at,
            validity_minutes,
        }
    }
}

// =============================================================================
// PhaseEvent and nested payload records
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseMeta {
    pub engine: String,
    pub event_id: String,
    pub event_type: EventType,
    pub generated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTimeframe {
    pub value: u16,
    pub tf_role: TfRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseEventDetail {
    pub name: String,
    pub directional_implication: DirectionalImplication,
    pub event_priority: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeContext {
    pub local_bias: LocalBias,
    pub htf_bias: LocalBias,
    pub macro_bias: LocalBias,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfidence {
    pub raw_strength: f64,
    pub htf_alignment: bool,
    pub confidence_score: f64,
    pub confidence_tier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionGuidance {
    pub trade_allowed: bool,
    pub allowed_directions: Vec<Side>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskHints {
    pub time_decay_minutes: i64,
    pub cooldown_tf: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseEvent {
    pub meta: PhaseMeta,
    pub instrument: Instrument,
    pub timeframe: PhaseTimeframe,
    pub event: PhaseEventDetail,
    pub regime_context: RegimeContext,
    pub confidence: PhaseConfidence,
    pub execution_guidance: ExecutionGuidance,
    pub risk_hints: RiskHints,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPhase {
    pub phase: PhaseEvent,
    pub received_at: i64,
    pub expires_at: i64,
}

impl StoredPhase {
    pub fn new(phase: PhaseEvent, received_at: i64) -> Self {
        let expires_at = received_at + phase.risk_hints.time_decay_minutes * 60 * 1000;
        Self {
            phase,
            received_at,
            expires_at,
        }
    }
}

// =============================================================================
// TrendSnapshot and derived alignment
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendTimeframeState {
    pub direction: TrendDirection,
    pub open: f64,
    pub close: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendAlignmentDerived {
    pub score: f64,
    pub strength: AlignmentStrength,
    pub htf_bias: TrendDirection,
    pub ltf_bias: TrendDirection,
    pub dominant_direction: TrendDirection,
    pub bullish_count: u8,
    pub bearish_count: u8,
    pub neutral_count: u8,
}

impl TrendAlignmentDerived {
    /// P7: strength classification from `dominant_count / 8 * 100`.
    pub fn classify_strength(score: f64) -> AlignmentStrength {
        if score >= 75.0 {
            AlignmentStrength::Strong
        } else if score >= 62.5 {
            AlignmentStrength::Moderate
        } else if score >= 50.0 {
            AlignmentStrength::Weak
        } else {
            AlignmentStrength::Choppy
        }
    }

    pub fn derive(timeframes: &HashMap<TrendTimeframeKey, TrendTimeframeState>) -> Self {
        let mut bullish = 0u8;
        let mut bearish = 0u8;
        let mut neutral = 0u8;
        for state in timeframes.values() {
            match state.direction {
                TrendDirection::Bullish => bullish += 1,
                TrendDirection::Bearish => bearish += 1,
                TrendDirection::Neutral => neutral += 1,
            }
        }

        let dominant_direction = if bullish >= bearish && bullish >= neutral {
            TrendDirection::Bullish
        } else if bearish >= bullish && bearish >= neutral {
            TrendDirection::Bearish
        } else {
            TrendDirection::Neutral
        };

        let dominant_count = match dominant_direction {
            TrendDirection::Bullish => bullish,
            TrendDirection::Bearish => bearish,
            TrendDirection::Neutral => neutral,
        };

        let score = dominant_count as f64 / 8.0 * 100.0;
        let strength = Self::classify_strength(score);

        let htf_bias = timeframes
            .get(&TrendTimeframeKey::Tf240min)
            .map(|s| s.direction)
            .unwrap_or(TrendDirection::Neutral);
        let ltf_bias = timeframes
            .get(&TrendTimeframeKey::Tf3min)
            .map(|s| s.direction)
            .unwrap_or(TrendDirection::Neutral);

        Self {
            score,
            strength,
            htf_bias,
            ltf_bias,
            dominant_direction,
            bullish_count: bullish,
            bearish_count: bearish,
            neutral_count: neutral,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSnapshot {
    pub ticker: String,
    pub exchange: String,
    pub timestamp: i64,
    pub price: f64,
    pub timeframes: HashMap<TrendTimeframeKey, TrendTimeframeState>,
    pub alignment: TrendAlignmentDerived,
}

impl TrendSnapshot {
    pub fn new(
        ticker: impl Into<String>,
        exchange: impl Into<String>,
        timestamp: i64,
        price: f64,
        timeframes: HashMap<TrendTimeframeKey, TrendTimeframeState>,
    ) -> Self {
        let alignment = TrendAlignmentDerived::derive(&timeframes);
        Self {
            ticker: ticker.into(),
            exchange: exchange.into(),
            timestamp,
            price,
            timeframes,
            alignment,
        }
    }
}

/// Partial trend update from an `MTF_DOTS` payload: only the 3M/5M dots,
/// not a full 8-timeframe snapshot. Feeds `ContextStore`, not `TrendStore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialTrendUpdate {
    pub ticker: String,
    pub timeframes: HashMap<TrendTimeframeKey, TrendTimeframeState>,
}

/// Structural setup from a `STRAT_EXEC` payload, feeding
/// `DecisionContext.structure`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuralSetup {
    pub ticker: String,
    pub setup_valid: bool,
    pub liquidity_ok: bool,
    pub quality: ExecutionQuality,
    pub ai_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTrend {
    pub snapshot: TrendSnapshot,
    pub received_at: i64,
    pub expires_at: i64,
}

/// Fixed TTL for trend snapshots, per §3.
pub const TREND_TTL_MINUTES: i64 = 60;

impl StoredTrend {
    pub fn new(snapshot: TrendSnapshot, received_at: i64) -> Self {
        Self {
            snapshot,
            received_at,
            expires_at: received_at + TREND_TTL_MINUTES * 60 * 1000,
        }
    }
}

// =============================================================================
// DecisionContext (composed view)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionContextMeta {
    pub engine_version: String,
    pub received_at: i64,
    pub completeness: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeSummary {
    pub phase: Option<u8>,
    pub phase_name: Option<PhaseName>,
    pub volatility: Volatility,
    pub confidence: f64,
    pub bias: LocalBias,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentSummary {
    pub tf_states: HashMap<Timeframe, Side>,
    pub bullish_pct: f64,
    pub bearish_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertSummary {
    pub direction: Side,
    pub ai_score: f64,
    pub quality: Quality,
    pub components: ScoreBreakdown,
    pub rr1: f64,
    pub rr2: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureSummary {
    pub valid_setup: bool,
    pub liquidity_ok: bool,
    pub execution_quality: ExecutionQuality,
    pub ai_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionContext {
    pub meta: DecisionContextMeta,
    pub instrument: Instrument,
    pub regime: Option<RegimeSummary>,
    pub alignment: AlignmentSummary,
    pub expert: Option<ExpertSummary>,
    pub structure: Option<StructureSummary>,
}

// =============================================================================
// MarketContext
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsData {
    pub put_call_ratio: f64,
    pub iv_percentile: f64,
    pub gamma_bias: GammaBias,
    pub source: ContextSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStats {
    pub atr14: f64,
    pub rv20: f64,
    pub trend_slope: f64,
    pub source: ContextSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityData {
    pub spread_bps: f64,
    pub depth_score: f64,
    pub trade_velocity: String,
    pub source: ContextSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketContext {
    pub options_data: OptionsData,
    pub market_stats: MarketStats,
    pub liquidity_data: LiquidityData,
}

/// Per-provider call metadata returned alongside `MarketContext` (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCallMeta {
    pub success: bool,
    pub source: ContextSource,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketContextMeta {
    pub options: ProviderCallMeta,
    pub stats: ProviderCallMeta,
    pub liquidity: ProviderCallMeta,
}

// =============================================================================
// DecisionPacket
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiplierBreakdown {
    pub confluence_multiplier: f64,
    pub quality_multiplier: f64,
    pub htf_alignment_multiplier: f64,
    pub rr_multiplier: f64,
    pub volume_multiplier: f64,
    pub trend_multiplier: f64,
    pub session_multiplier: f64,
    pub day_multiplier: f64,
    pub phase_confidence_boost: f64,
    pub phase_position_boost: f64,
    pub trend_alignment_boost: f64,
    pub final_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub name: String,
    pub passed: bool,
    pub reason: Option<String>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionPacket {
    pub decision: Decision,
    pub direction: Option<Side>,
    pub reason: String,
    pub breakdown: Option<MultiplierBreakdown>,
    pub engine_version: String,
    pub config_hash: String,
    pub confluence_score: f64,
    pub recommended_contracts: u32,
    pub entry_signal: Option<EnrichedSignal>,
    pub stop_loss: Option<f64>,
    pub target_1: Option<f64>,
    pub target_2: Option<f64>,
    pub gate_results: Vec<GateResult>,
    pub timestamp: i64,
}
