// =============================================================================
// DecisionEngine — Orchestrates Stores -> Builder -> Confluence -> Sizer -> Gates
// =============================================================================
//
// Pipeline (mirrors the teacher's `StrategyEngine::evaluate_symbol` numbered
// stages, generalized from a single-candle trigger to an on-demand decision
// request over three independent stores):
//   1. Snapshot active signals/phases/trend for the ticker (one read per
//      store, no re-reads mid-evaluation).
//   2. Build MarketContext via the parallel provider fan-out.
//   3. Run the gate pipeline (which itself computes confluence/HTF/sizing
//      internally up to the point a gate would stop it).
//   4. On Passed, run the full multiplier pipeline and emit an EXECUTE
//      DecisionPacket; on Stopped, emit the WAIT/SKIP packet directly.
//   5. Record a DecisionEntry in the audit log.
// =============================================================================

use std::sync::Arc;

use tracing::info;

use crate::audit::{AuditLog, DecisionEntry};
use crate::clock::Clock;
use crate::config::ConfigRegistry;
use crate::gates::{GatePipeline, GateOutcome};
use crate::market_context::MarketContextBuilder;
use crate::model::{Decision, DecisionPacket, StoredPhase, StoredSignal, Timeframe, TrendAlignmentDerived};
use crate::sizer::PositionSizer;
use crate::stores::{ContextStore, PhaseStore, TimeframeStore, TrendStore};

pub struct DecisionEngine {
    pub timeframe_store: Arc<TimeframeStore>,
    pub phase_store: Arc<PhaseStore>,
    pub trend_store: Arc<TrendStore>,
    pub context_store: Arc<ContextStore>,
    pub market_context_builder: Arc<MarketContextBuilder>,
    pub audit_log: Arc<AuditLog>,
    pub config: Arc<ConfigRegistry>,
    pub clock: Arc<dyn Clock>,
}

impl DecisionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timeframe_store: Arc<TimeframeStore>,
        phase_store: Arc<PhaseStore>,
        trend_store: Arc<TrendStore>,
        context_store: Arc<ContextStore>,
        market_context_builder: Arc<MarketContextBuilder>,
        audit_log: Arc<AuditLog>,
        config: Arc<ConfigRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            timeframe_store,
            phase_store,
            trend_store,
            context_store,
            market_context_builder,
            audit_log,
            config,
            clock,
        }
    }

    /// Evaluate one decision for `ticker`, consulting all three stores'
    /// current snapshot plus a freshly built `MarketContext`.
    pub async fn decide(&self, ticker: &str, request_id: &str) -> DecisionPacket {
        let now = self.clock.now_millis();
        let config = self.config.config();

        let active_signals: Vec<(Timeframe, StoredSignal)> = self.timeframe_store.active(ticker, now);
        let active_phases: Vec<StoredPhase> = self
            .phase_store
            .active(ticker, now)
            .into_iter()
            .map(|(_, phase)| phase)
            .collect();
        let trend = self.trend_store.get(ticker, now);
        let trend_alignment: Option<TrendAlignmentDerived> =
            trend.as_ref().map(|t| t.snapshot.alignment.clone());
        let structure_summary = self
            .context_store
            .compose(ticker, now)
            .and_then(|ctx| ctx.structure);

        let (market_context, market_context_meta) = self.market_context_builder.build(ticker).await;
        let market_context_has_fallback = market_context.options_data.source
            == crate::model::ContextSource::Fallback
            || market_context.market_stats.source == crate::model::ContextSource::Fallback
            || market_context.liquidity_data.source == crate::model::ContextSource::Fallback;

        let outcome = GatePipeline::evaluate(
            &active_signals,
            &active_phases,
            structure_summary.as_ref(),
            trend_alignment.as_ref(),
            &market_context,
            market_context_has_fallback,
            now,
            config,
        );

        let active_signals_map: std::collections::HashMap<Timeframe, StoredSignal> =
            active_signals.into_iter().collect();
        let packet = self.finish(outcome, now, trend_alignment, &active_signals_map, config);

        info!(
            ticker,
            request_id,
            decision = ?packet.decision,
            confluence_score = packet.confluence_score,
            options_duration_ms = market_context_meta.options.duration_ms,
            stats_duration_ms = market_context_meta.stats.duration_ms,
            liquidity_duration_ms = market_context_meta.liquidity.duration_ms,
            "decision evaluated"
        );

        self.audit_log.record_decision(DecisionEntry {
            request_id: request_id.to_string(),
            ticker: ticker.to_string(),
            packet: packet.clone(),
        });

        packet
    }

    fn finish(
        &self,
        outcome: GateOutcome,
        now: i64,
        trend_alignment: Option<TrendAlignmentDerived>,
        active_signals_map: &std::collections::HashMap<Timeframe, StoredSignal>,
        config: &crate::config::EngineConfig,
    ) -> DecisionPacket {
        match outcome {
            GateOutcome::Stopped { decision, reason, results } => DecisionPacket {
                decision,
                direction: None,
                reason,
                breakdown: None,
                engine_version: crate::config::ENGINE_VERSION.to_string(),
                config_hash: self.config.config_hash().to_string(),
                confluence_score: results
                    .iter()
                    .find(|r| r.name == "confluence_threshold")
                    .and_then(|r| r.score)
                    .unwrap_or(0.0),
                recommended_contracts: 0,
                entry_signal: None,
                stop_loss: None,
                target_1: None,
                target_2: None,
                gate_results: results,
                timestamp: now,
            },
            GateOutcome::Passed {
                entry_signal,
                confluence_score,
                direction,
                stop_loss,
                target_1,
                target_2,
                active_phases,
                results,
            } => {
                let htf_alignment = PositionSizer::htf_alignment(
                    &entry_signal,
                    active_signals_map,
                    &active_phases,
                    config,
                );
                let (breakdown, recommended_contracts, should_skip) = PositionSizer::compute(
                    &entry_signal,
                    confluence_score,
                    htf_alignment,
                    &active_phases,
                    trend_alignment.as_ref(),
                    config,
                );

                let decision = if should_skip {
                    Decision::Skip
                } else {
                    Decision::Execute
                };
                let reason = if should_skip {
                    "Position multiplier below minimum".to_string()
                } else {
                    "All gates passed".to_string()
                };

                DecisionPacket {
                    decision,
                    direction: Some(direction),
                    reason,
                    breakdown: Some(breakdown),
                    engine_version: crate::config::ENGINE_VERSION.to_string(),
                    config_hash: self.config.config_hash().to_string(),
                    confluence_score,
                    recommended_contracts,
                    entry_signal: Some(entry_signal),
                    stop_loss: Some(stop_loss),
                    target_1: Some(target_1),
                    target_2: Some(target_2),
                    gate_results: results,
                    timestamp: now,
                }
            }
        }
    }
}
