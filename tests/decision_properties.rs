// =============================================================================
// Integration tests — decision properties and end-to-end scenarios
// =============================================================================
//
// Exercises `DecisionEngine::decide` against a private store set and an
// injected `FixedClock`, the way the teacher's `regime/detector.rs` unit
// tests build a private fixture rather than touching shared global state.

use std::collections::HashMap;
use std::sync::Arc;

use confluence_engine::audit::AuditLog;
use confluence_engine::clock::{Clock, FixedClock};
use confluence_engine::config::ConfigRegistry;
use confluence_engine::engine::DecisionEngine;
use confluence_engine::market_context::{LiquiditySource, MarketContextBuilder, OptionsSource, StatsSource};
use confluence_engine::model::*;
use confluence_engine::rng::DeterministicRng;
use confluence_engine::session::{DayOfWeek, MarketSession};
use confluence_engine::stores::{ContextStore, PhaseStore, TimeframeKey, TimeframeStore, TrendStore};

const NOW: i64 = 1_704_812_400_000; // Tuesday 10:00 America/New_York (OPEN), per session.rs fixture.

fn signal(timeframe: Timeframe, direction: Side, ai_score: f64, received_at: i64) -> EnrichedSignal {
    EnrichedSignal {
        signal: SignalCore {
            signal_type: direction,
            timeframe,
            quality: Quality::High,
            ai_score,
            timestamp: received_at,
            bar_time: received_at,
        },
        instrument: Instrument {
            exchange: "CME".to_string(),
            ticker: "SPY".to_string(),
            current_price: 500.0,
        },
        entry: EntryPlan {
            price: 500.0,
            stop_loss: 498.0,
            target_1: 503.0,
            target_2: 506.0,
            stop_reason: "ATR".to_string(),
        },
        risk: RiskPlan {
            amount: 100.0,
            rr_ratio_t1: 3.0,
            rr_ratio_t2: 5.0,
            stop_distance_pct: 0.4,
            recommended_shares: 10.0,
            recommended_contracts: 2,
            position_multiplier: 1.0,
            account_risk_pct: 1.0,
            max_loss_dollars: 100.0,
        },
        market_context: SignalMarketContext {
            vwap: 500.0,
            pmh: 505.0,
            pml: 495.0,
            day_open: 499.0,
            day_change_pct: 0.2,
            price_vs_vwap_pct: 0.1,
            distance_to_pmh: 1.0,
            distance_to_pml: 1.0,
            atr: 2.0,
            volume_vs_avg: 1.6,
            candle_direction: CandleDirection::Green,
            candle_size_atr: 0.5,
        },
        trend: TrendContext {
            ema_8: 500.0,
            ema_21: 498.0,
            ema_50: 495.0,
            alignment: TrendAlignment::Bullish,
            strength: 85.0,
            rsi: 60.0,
            macd_signal: 0.1,
        },
        mtf_context: MtfContext {
            h4_bias: direction,
            h4_rsi: 60.0,
            h1_bias: direction,
        },
        score_breakdown: ScoreBreakdown {
            strat: 1.0,
            trend: 1.0,
            gamma: 1.0,
            vwap: 1.0,
            mtf: 1.0,
            golf: 1.0,
        },
        time_context: TimeContext {
            market_session: MarketSession::Open,
            day_of_week: DayOfWeek::Tuesday,
        },
    }
}

fn phase(name: &str, directional: DirectionalImplication, decay_minutes: i64) -> PhaseEvent {
    PhaseEvent {
        meta: PhaseMeta {
            engine: "SATY_PO".to_string(),
            event_id: "evt-1".to_string(),
            event_type: EventType::RegimePhaseEntry,
            generated_at: NOW,
        },
        instrument: Instrument {
            exchange: "CME".to_string(),
            ticker: "SPY".to_string(),
            current_price: 500.0,
        },
        timeframe: PhaseTimeframe { value: 240, tf_role: TfRole::Regime },
        event: PhaseEventDetail {
            name: name.to_string(),
            directional_implication: directional,
            event_priority: 1,
        },
        regime_context: RegimeContext {
            local_bias: LocalBias::Bullish,
            htf_bias: LocalBias::Bullish,
            macro_bias: LocalBias::Bullish,
        },
        confidence: PhaseConfidence {
            raw_strength: 80.0,
            htf_alignment: true,
            confidence_score: 92.0,
            confidence_tier: "HIGH".to_string(),
        },
        execution_guidance: ExecutionGuidance {
            trade_allowed: true,
            allowed_directions: vec![Side::Long],
        },
        risk_hints: RiskHints {
            time_decay_minutes: decay_minutes,
            cooldown_tf: 15,
        },
    }
}

struct Harness {
    engine: DecisionEngine,
}

impl Harness {
    fn new(now: i64) -> Self {
        let config = Arc::new(ConfigRegistry::default_frozen());
        let market_context_builder = Arc::new(MarketContextBuilder::from_clients(
            OptionsSource::Disabled,
            StatsSource::Disabled,
            LiquiditySource::Disabled,
            std::time::Duration::from_millis(50),
            0,
            DeterministicRng::from_seed(7),
        ));
        let engine = DecisionEngine::new(
            Arc::new(TimeframeStore::new()),
            Arc::new(PhaseStore::new()),
            Arc::new(TrendStore::new()),
            Arc::new(ContextStore::new()),
            market_context_builder,
            Arc::new(AuditLog::new()),
            config,
            Arc::new(FixedClock::new(now)),
        );
        Self { engine }
    }

    fn put_signal(&self, timeframe: Timeframe, direction: Side, ai_score: f64) {
        let stored = StoredSignal::new(signal(timeframe, direction, ai_score, NOW), NOW);
        self.engine.timeframe_store.put(
            TimeframeKey { ticker: "SPY".to_string(), timeframe },
            stored,
        );
    }

    fn put_phase(&self, name: &str, implication: DirectionalImplication) {
        let stored = StoredPhase::new(phase(name, implication, 60), NOW);
        self.engine.phase_store.put(
            confluence_engine::stores::PhaseKey { ticker: "SPY".to_string(), tf_role: TfRole::Regime },
            stored,
        );
    }
}

fn full_long_confluence(h: &Harness) {
    h.put_signal(Timeframe::Tf240, Side::Long, 8.5);
    h.put_signal(Timeframe::Tf60, Side::Long, 8.0);
    h.put_signal(Timeframe::Tf30, Side::Long, 7.5);
    h.put_signal(Timeframe::Tf15, Side::Long, 7.0);
    h.put_phase("MARKUP", DirectionalImplication::UpsidePotential);
}

#[tokio::test]
async fn p1_same_inputs_yield_identical_decision() {
    let h = Harness::new(NOW);
    full_long_confluence(&h);

    let first = h.engine.decide("SPY", "req-1").await;
    let second = h.engine.decide("SPY", "req-2").await;

    assert_eq!(first.decision, second.decision);
    assert_eq!(first.confluence_score, second.confluence_score);
    assert_eq!(first.recommended_contracts, second.recommended_contracts);
    assert_eq!(first.direction, second.direction);
}

#[tokio::test]
async fn s1_perfect_confluence_executes_long() {
    let h = Harness::new(NOW);
    full_long_confluence(&h);

    let packet = h.engine.decide("SPY", "req-1").await;

    assert_eq!(packet.decision, Decision::Execute);
    assert_eq!(packet.direction, Some(Side::Long));
    assert!(packet.confluence_score >= 60.0);
    assert!(packet.recommended_contracts >= 1);
    assert!(packet.breakdown.is_some());
}

#[tokio::test]
async fn no_signals_waits_with_zero_confluence() {
    let h = Harness::new(NOW);
    let packet = h.engine.decide("SPY", "req-1").await;

    assert_eq!(packet.decision, Decision::Wait);
    assert_eq!(packet.confluence_score, 0.0);
    assert!(packet.entry_signal.is_none());
}

#[tokio::test]
async fn weak_single_timeframe_confluence_waits() {
    let h = Harness::new(NOW);
    h.put_signal(Timeframe::Tf3, Side::Long, 6.5);

    let packet = h.engine.decide("SPY", "req-1").await;

    assert_eq!(packet.decision, Decision::Wait);
    assert!(packet.confluence_score < 60.0);
}

#[tokio::test]
async fn distribution_regime_skips_all_directions() {
    let h = Harness::new(NOW);
    full_long_confluence(&h);
    // DISTRIBUTION allows no directions (model.rs PhaseName::allowed_directions).
    h.put_phase("DISTRIBUTION", DirectionalImplication::Neutral);

    let packet = h.engine.decide("SPY", "req-1").await;

    assert_eq!(packet.decision, Decision::Skip);
}

#[tokio::test]
async fn expired_signal_does_not_contribute_after_ttl() {
    let h = Harness::new(NOW);
    full_long_confluence(&h);

    // Tf15 validity is 30 minutes; move the clock a day forward so every
    // signal has expired, then the decision should fall back to WAIT.
    let later = Harness::new(NOW + 2 * 24 * 60 * 60 * 1000);
    let packet = later.engine.decide("SPY", "req-1").await;
    assert_eq!(packet.decision, Decision::Wait);
    let _ = h;
}

#[tokio::test]
async fn config_hash_is_stable_across_decisions() {
    let h = Harness::new(NOW);
    full_long_confluence(&h);

    let first = h.engine.decide("SPY", "req-1").await;
    let second = h.engine.decide("SPY", "req-2").await;
    assert_eq!(first.config_hash, second.config_hash);
    assert_eq!(first.config_hash.len(), 16);
}
