// =============================================================================
// End-to-end decision scenarios (S1-S6)
// =============================================================================
//
// Each scenario builds a private store set and an injected `FixedClock`, the
// same isolation `decision_properties.rs` uses. S4 is the one exception: the
// override half of the gamma-bias conflict can never fire in the current
// market gate (the "alignment in direction" proxy it checks is derived from
// the same gamma bias that creates the conflict), so only the conflict-blocks
// half is exercised, directly against `GatePipeline::evaluate` rather than
// through a `MarketContextBuilder` the existing fixtures can't fake real
// provider data for.
// =============================================================================

use std::sync::Arc;

use confluence_engine::audit::AuditLog;
use confluence_engine::clock::FixedClock;
use confluence_engine::config::{ConfigRegistry, EngineConfig};
use confluence_engine::engine::DecisionEngine;
use confluence_engine::gates::GatePipeline;
use confluence_engine::gates::GateOutcome;
use confluence_engine::market_context::{LiquiditySource, MarketContextBuilder, OptionsSource, StatsSource};
use confluence_engine::model::*;
use confluence_engine::rng::DeterministicRng;
use confluence_engine::session::{DayOfWeek, MarketSession};
use confluence_engine::stores::{ContextStore, PhaseStore, TimeframeKey, TimeframeStore, TrendStore};

// Tuesday 2024-01-09, 10:00 America/New_York (OPEN). 11 hours later lands at
// 21:00 UTC = 16:00 America/New_York (AFTERHOURS), per session.rs's own fixture.
const NOW: i64 = 1_704_812_400_000;
const AFTERHOURS_NOW: i64 = NOW + 11 * 3_600_000;

fn signal_with(
    timeframe: Timeframe,
    direction: Side,
    ai_score: f64,
    quality: Quality,
    h4_bias: Side,
    h1_bias: Side,
    received_at: i64,
    session: MarketSession,
) -> EnrichedSignal {
    EnrichedSignal {
        signal: SignalCore {
            signal_type: direction,
            timeframe,
            quality,
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
            h4_bias,
            h4_rsi: 60.0,
            h1_bias,
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
            market_session: session,
            day_of_week: DayOfWeek::Tuesday,
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

    fn put(&self, at: i64, timeframe: Timeframe, direction: Side, ai_score: f64, quality: Quality, h4_bias: Side, h1_bias: Side) {
        let signal = signal_with(timeframe, direction, ai_score, quality, h4_bias, h1_bias, at, MarketSession::Midday);
        self.engine.timeframe_store.put(
            TimeframeKey { ticker: "SPY".to_string(), timeframe },
            StoredSignal::new(signal, at),
        );
    }
}

/// S1 — LONG signals stacked across all four traded timeframes, aligned
/// HTF bias, strong trend and R:R: EXECUTE with a multiplier clamped at the
/// configured ceiling.
#[tokio::test]
async fn s1_perfect_alignment_executes_at_clamped_multiplier() {
    let h = Harness::new(NOW);
    h.put(NOW, Timeframe::Tf240, Side::Long, 9.0, Quality::Extreme, Side::Long, Side::Long);
    h.put(NOW, Timeframe::Tf60, Side::Long, 9.0, Quality::Extreme, Side::Long, Side::Long);
    h.put(NOW, Timeframe::Tf30, Side::Long, 9.0, Quality::Extreme, Side::Long, Side::Long);
    h.put(NOW, Timeframe::Tf15, Side::Long, 9.0, Quality::Extreme, Side::Long, Side::Long);

    let packet = h.engine.decide("SPY", "s1").await;

    assert_eq!(packet.decision, Decision::Execute);
    assert_eq!(packet.direction, Some(Side::Long));
    assert_eq!(packet.confluence_score, 90.0);
    let breakdown = packet.breakdown.expect("executed decisions carry a breakdown");
    assert_eq!(breakdown.htf_alignment_multiplier, 1.3);
    // Raw product comfortably exceeds the ceiling; clamp, don't skip.
    assert_eq!(breakdown.final_multiplier, 3.0);
    assert!(packet.recommended_contracts >= 1);
}

/// S2 — only a 15M signal is active, so the HTF-bias gate has nothing to
/// anchor on: WAIT before confluence is even scored.
#[tokio::test]
async fn s2_missing_htf_bias_waits() {
    let h = Harness::new(NOW);
    h.put(NOW, Timeframe::Tf15, Side::Long, 9.0, Quality::Extreme, Side::Long, Side::Long);

    let packet = h.engine.decide("SPY", "s2").await;

    assert_eq!(packet.decision, Decision::Wait);
    assert!(packet.reason.contains("No valid HTF bias"));
    assert!(packet.entry_signal.is_none());
}

/// S3 — counter-trend: the only stored HTF signal is a 240M LONG, but the
/// entry's own 4H/1H bias fields both disagree with it. `h4_aligned` is
/// still true via the stored-signal rule, `h1_aligned` is false (no stored
/// 60M signal, and the mtf field disagrees too), so the pair resolves to
/// COUNTER rather than GOOD. 30M/15M signals lift confluence over threshold
/// without involving a 60M signal that would otherwise force PERFECT.
#[tokio::test]
async fn s3_counter_trend_executes_with_halved_multiplier() {
    let h = Harness::new(NOW);
    h.put(NOW, Timeframe::Tf240, Side::Long, 9.0, Quality::Extreme, Side::Short, Side::Short);
    h.put(NOW, Timeframe::Tf30, Side::Long, 8.0, Quality::Extreme, Side::Short, Side::Short);
    h.put(NOW, Timeframe::Tf15, Side::Long, 7.0, Quality::Extreme, Side::Short, Side::Short);

    let packet = h.engine.decide("SPY", "s3").await;

    assert_eq!(packet.decision, Decision::Execute);
    assert_eq!(packet.direction, Some(Side::Long));
    assert_eq!(packet.confluence_score, 65.0);
    let breakdown = packet.breakdown.expect("executed decisions carry a breakdown");
    assert_eq!(breakdown.htf_alignment_multiplier, 0.5);
}

/// S4 (partial) — a gamma bias opposing the trade direction blocks
/// execution unless the in-direction alignment percentage clears the
/// override threshold. Exercised directly against the gate, since
/// `MarketContextBuilder`'s only non-fallback path is a live provider call
/// this test harness has no mock server for. The override branch itself is
/// not exercised here: with this gate's alignment proxy derived from the
/// same gamma bias that creates the conflict, a real conflict can never
/// produce a proxy value above the override threshold, so only the
/// conflict-blocks-the-trade half is a claim this suite can honestly make.
#[test]
fn s4_gamma_conflict_blocks_execution_absent_override() {
    let config = EngineConfig::default();
    let active = vec![
        (Timeframe::Tf240, StoredSignal::new(
            signal_with(Timeframe::Tf240, Side::Short, 9.0, Quality::Extreme, Side::Short, Side::Short, NOW, MarketSession::Midday),
            NOW,
        )),
        (Timeframe::Tf60, StoredSignal::new(
            signal_with(Timeframe::Tf60, Side::Short, 9.0, Quality::Extreme, Side::Short, Side::Short, NOW, MarketSession::Midday),
            NOW,
        )),
    ];
    let market_context = MarketContext {
        options_data: OptionsData {
            put_call_ratio: 0.6,
            iv_percentile: 40.0,
            gamma_bias: GammaBias::Positive,
            source: ContextSource::Api,
        },
        market_stats: MarketStats {
            atr14: 1.0,
            rv20: 0.15,
            trend_slope: -0.1,
            source: ContextSource::Api,
        },
        liquidity_data: LiquidityData {
            spread_bps: 5.0,
            depth_score: 80.0,
            trade_velocity: "NORMAL".to_string(),
            source: ContextSource::Api,
        },
    };

    let outcome = GatePipeline::evaluate(&active, &[], None, None, &market_context, false, NOW, &config);

    match outcome {
        GateOutcome::Stopped { decision, reason, .. } => {
            assert_eq!(decision, Decision::Skip);
            assert!(reason.contains("gamma-bias conflict") || reason.contains("Market gate failed"));
        }
        GateOutcome::Passed { .. } => panic!("gamma conflict with no override should not pass the market gate"),
    }
}

/// S5 — after-hours: identical signal stack to S1, evaluated at a clock
/// time that classifies as AFTERHOURS. The session gate blocks execution
/// after every earlier gate (including the multiplier floor) would pass.
#[tokio::test]
async fn s5_after_hours_skips() {
    let h = Harness::new(AFTERHOURS_NOW);
    h.put(AFTERHOURS_NOW, Timeframe::Tf240, Side::Long, 9.0, Quality::Extreme, Side::Long, Side::Long);
    h.put(AFTERHOURS_NOW, Timeframe::Tf60, Side::Long, 9.0, Quality::Extreme, Side::Long, Side::Long);
    h.put(AFTERHOURS_NOW, Timeframe::Tf30, Side::Long, 9.0, Quality::Extreme, Side::Long, Side::Long);
    h.put(AFTERHOURS_NOW, Timeframe::Tf15, Side::Long, 9.0, Quality::Extreme, Side::Long, Side::Long);

    let packet = h.engine.decide("SPY", "s5").await;

    assert_eq!(packet.decision, Decision::Skip);
    assert!(packet.reason.contains("Afterhours"));
}

/// S6 — confluence just below threshold: a single 60M signal contributes
/// only its own weight (25), well short of the 60 threshold. WAIT, with the
/// reason naming the threshold it fell under.
#[tokio::test]
async fn s6_confluence_below_threshold_waits() {
    let h = Harness::new(NOW);
    h.put(NOW, Timeframe::Tf60, Side::Long, 9.0, Quality::Extreme, Side::Long, Side::Long);

    let packet = h.engine.decide("SPY", "s6").await;

    assert_eq!(packet.decision, Decision::Wait);
    assert_eq!(packet.confluence_score, 25.0);
    assert!(packet.reason.contains("threshold"));
}
