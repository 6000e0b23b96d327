// =============================================================================
// GatePipeline — Ordered Regime / Structural / Market / Risk Gates (§4.7)
// =============================================================================
//
// Ordered short-circuit evaluation, modeled on the teacher's
// `SmartFilterEngine::evaluate` (sequential `if` checks returning the first
// blocking reason). Unlike the teacher's filters, which are individually
// feature-flag-gated and only ever produce a single block reason, every
// gate here always runs and contributes a `GateResult` to the audit trail
// even when it passes.
// =============================================================================

use crate::config::EngineConfig;
use crate::confluence::ConfluenceCalculator;
use crate::model::{
    Decision, EnrichedSignal, GammaBias, GateResult, MarketContext, PhaseName, Side,
    StoredPhase, StoredSignal, StructureSummary, Timeframe, TrendAlignmentDerived,
};
use crate::session::MarketSession;
use crate::sizer::PositionSizer;

/// Outcome of running the full gate pipeline.
pub enum GateOutcome {
    /// A gate stopped evaluation before an entry signal could be selected
    /// or executed. `decision` is `Wait` or `Skip`.
    Stopped {
        decision: Decision,
        reason: String,
        results: Vec<GateResult>,
    },
    /// All gates passed; carries the selected entry signal and the
    /// aligned signals used to pick the best stop/targets.
    Passed {
        entry_signal: EnrichedSignal,
        confluence_score: f64,
        direction: Side,
        stop_loss: f64,
        target_1: f64,
        target_2: f64,
        active_phases: Vec<StoredPhase>,
        results: Vec<GateResult>,
    },
}

pub struct GatePipeline;

impl GatePipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        active_signals: &[(Timeframe, StoredSignal)],
        active_phases: &[StoredPhase],
        structure: Option<&StructureSummary>,
        trend: Option<&TrendAlignmentDerived>,
        market_context: &MarketContext,
        market_context_has_fallback: bool,
        received_at_millis: i64,
        config: &EngineConfig,
    ) -> GateOutcome {
        let mut results = Vec::new();

        // Empty-signals gate.
        if active_signals.is_empty() {
            results.push(GateResult {
                name: "empty_signals".to_string(),
                passed: false,
                reason: Some("No active signals".to_string()),
                score: Some(0.0),
            });
            return GateOutcome::Stopped {
                decision: Decision::Wait,
                reason: "No active signals".to_string(),
                results,
            };
        }
        results.push(pass("empty_signals"));

        // Dominant-direction gate.
        let dominant = ConfluenceCalculator::dominant_direction(active_signals, config);
        let direction = match dominant.direction {
            Some(d) => d,
            None => {
                results.push(GateResult {
                    name: "dominant_direction".to_string(),
                    passed: false,
                    reason: Some("No clear direction".to_string()),
                    score: Some(0.0),
                });
                return GateOutcome::Stopped {
                    decision: Decision::Wait,
                    reason: "No clear direction".to_string(),
                    results,
                };
            }
        };
        results.push(pass("dominant_direction"));

        // HTF-bias gate: need a 240M or 60M active signal matching
        // direction with ai_score >= htf_min_ai_score.
        let htf_ok = active_signals.iter().any(|(tf, stored)| {
            matches!(tf, Timeframe::Tf240 | Timeframe::Tf60)
                && stored.signal.signal.signal_type == direction
                && stored.signal.signal.ai_score >= config.htf_min_ai_score
        });
        if !htf_ok {
            results.push(GateResult {
                name: "htf_bias".to_string(),
                passed: false,
                reason: Some("No valid HTF bias".to_string()),
                score: None,
            });
            return GateOutcome::Stopped {
                decision: Decision::Wait,
                reason: "No valid HTF bias".to_string(),
                results,
            };
        }
        results.push(pass("htf_bias"));

        // Confluence threshold.
        let confluence_score = ConfluenceCalculator::score(active_signals, direction, config);
        if confluence_score < config.confluence_threshold {
            results.push(GateResult {
                name: "confluence_threshold".to_string(),
                passed: false,
                reason: Some(format!(
                    "Confluence score {confluence_score:.1} below {}% threshold",
                    config.confluence_threshold
                )),
                score: Some(confluence_score),
            });
            return GateOutcome::Stopped {
                decision: Decision::Wait,
                reason: format!(
                    "Confluence score {confluence_score:.1} below {}% threshold",
                    config.confluence_threshold
                ),
                results,
            };
        }
        results.push(GateResult {
            name: "confluence_threshold".to_string(),
            passed: true,
            reason: None,
            score: Some(confluence_score),
        });

        // Entry-signal selection: highest-priority active signal matching
        // direction, priority order 240 -> 60 -> 30 -> 15 -> 5 -> 3.
        let entry = Timeframe::PRIORITY.iter().find_map(|tf| {
            active_signals
                .iter()
                .find(|(stf, stored)| stf == tf && stored.signal.signal.signal_type == direction)
        });
        let (_, entry_stored) = match entry {
            Some(e) => e,
            None => {
                results.push(GateResult {
                    name: "entry_signal_selection".to_string(),
                    passed: false,
                    reason: Some("No entry signal available for dominant direction".to_string()),
                    score: None,
                });
                return GateOutcome::Stopped {
                    decision: Decision::Wait,
                    reason: "No entry signal available for dominant direction".to_string(),
                    results,
                };
            }
        };
        let entry_signal = entry_stored.signal.clone();
        results.push(pass("entry_signal_selection"));

        // Regime gate: phase allowedDirections.
        if let Some(phase) = active_phases.first() {
            if let Some(phase_name) = phase_name_from_event(&phase.phase.event.name) {
                let allowed = phase_name.allowed_directions();
                if !allowed.contains(&direction) {
                    results.push(GateResult {
                        name: "regime".to_string(),
                        passed: false,
                        reason: Some(format!("{direction:?} not allowed in {phase_name:?} phase")),
                        score: None,
                    });
                    return GateOutcome::Stopped {
                        decision: Decision::Skip,
                        reason: format!("{direction:?} not allowed in {phase_name:?} phase"),
                        results,
                    };
                }
            }
        }
        results.push(pass("regime"));

        // Structural gate.
        if let Some(structure) = structure {
            let ok = structure.valid_setup
                && structure.liquidity_ok
                && matches!(
                    structure.execution_quality,
                    crate::model::ExecutionQuality::A | crate::model::ExecutionQuality::B
                )
                && structure.ai_score >= config.structural_min_ai_score;
            if !ok {
                let reason = "Structural setup invalid, illiquid, or low-quality".to_string();
                results.push(GateResult {
                    name: "structural".to_string(),
                    passed: false,
                    reason: Some(reason.clone()),
                    score: None,
                });
                return GateOutcome::Stopped {
                    decision: Decision::Skip,
                    reason,
                    results,
                };
            }
        }
        results.push(pass("structural"));

        // Market gate.
        let alignment_pct_in_direction = match direction {
            Side::Long => 100.0 - market_context_bearish_proxy(market_context),
            Side::Short => market_context_bearish_proxy(market_context),
        };
        if market_context_has_fallback {
            results.push(GateResult {
                name: "market".to_string(),
                passed: true,
                reason: Some("No market data available".to_string()),
                score: Some(50.0),
            });
        } else {
            let spread_ok = market_context.liquidity_data.spread_bps <= config.max_spread_bps;
            let atr_ok = market_context.market_stats.atr14 <= config.max_atr_spike;
            let depth_ok = market_context.liquidity_data.depth_score >= config.min_depth_score;

            let gamma_conflict = match (market_context.options_data.gamma_bias, direction) {
                (GammaBias::Positive, Side::Short) => true,
                (GammaBias::Negative, Side::Long) => true,
                _ => false,
            };
            let gamma_override = alignment_pct_in_direction >= config.gamma_override_alignment_pct;
            let gamma_ok = !gamma_conflict || gamma_override;

            if !(spread_ok && atr_ok && depth_ok && gamma_ok) {
                let reason = "Market gate failed: spread, ATR, depth, or gamma-bias conflict".to_string();
                results.push(GateResult {
                    name: "market".to_string(),
                    passed: false,
                    reason: Some(reason.clone()),
                    score: None,
                });
                return GateOutcome::Stopped {
                    decision: Decision::Skip,
                    reason,
                    results,
                };
            }
            results.push(pass("market"));
        }

        // Session gate: AFTERHOURS blocks execution.
        let (session, _day) = crate::session::classify(received_at_millis);
        if session == MarketSession::Afterhours {
            let reason = "Afterhours session blocks execution".to_string();
            results.push(GateResult {
                name: "session".to_string(),
                passed: false,
                reason: Some(reason.clone()),
                score: None,
            });
            return GateOutcome::Stopped {
                decision: Decision::Skip,
                reason,
                results,
            };
        }
        results.push(pass("session"));

        // Multiplier floor.
        let active_phases_for_direction: Vec<StoredPhase> = active_phases.to_vec();
        let htf_alignment = PositionSizer::htf_alignment(
            &entry_signal,
            &active_signals
                .iter()
                .cloned()
                .collect::<std::collections::HashMap<_, _>>(),
            &active_phases_for_direction,
            config,
        );
        let (_, _, should_skip) = PositionSizer::compute(
            &entry_signal,
            confluence_score,
            htf_alignment,
            &active_phases_for_direction,
            trend,
            config,
        );
        if should_skip {
            let reason = "Position multiplier below minimum".to_string();
            results.push(GateResult {
                name: "multiplier_floor".to_string(),
                passed: false,
                reason: Some(reason.clone()),
                score: None,
            });
            return GateOutcome::Stopped {
                decision: Decision::Skip,
                reason,
                results,
            };
        }
        results.push(pass("multiplier_floor"));

        // Select best stop/targets across aligned signals.
        let aligned: Vec<&StoredSignal> = active_signals
            .iter()
            .filter(|(_, s)| s.signal.signal.signal_type == direction)
            .map(|(_, s)| s)
            .collect();

        let (stop_loss, target_1, target_2) = match direction {
            Side::Long => (
                aligned
                    .iter()
                    .map(|s| s.signal.entry.stop_loss)
                    .fold(f64::MIN, f64::max),
                aligned
                    .iter()
                    .map(|s| s.signal.entry.target_1)
                    .fold(f64::MIN, f64::max),
                aligned
                    .iter()
                    .map(|s| s.signal.entry.target_2)
                    .fold(f64::MIN, f64::max),
            ),
            Side::Short => (
                aligned
                    .iter()
                    .map(|s| s.signal.entry.stop_loss)
                    .fold(f64::MAX, f64::min),
                aligned
                    .iter()
                    .map(|s| s.signal.entry.target_1)
                    .fold(f64::MAX, f64::min),
                aligned
                    .iter()
                    .map(|s| s.signal.entry.target_2)
                    .fold(f64::MAX, f64::min),
            ),
        };

        GateOutcome::Passed {
            entry_signal,
            confluence_score,
            direction,
            stop_loss,
            target_1,
            target_2,
            active_phases: active_phases_for_direction,
            results,
        }
    }
}

fn pass(name: &str) -> GateResult {
    GateResult {
        name: name.to_string(),
        passed: true,
        reason: None,
        score: None,
    }
}

/// Crude proxy for "alignment in trade direction" used by the gamma-bias
/// override: the bearish percentage implied by the options desk's bias.
/// `DecisionContext.alignment.bearishPct` is the authoritative source when
/// a `TrendSnapshot` is available; this proxy keeps the market gate
/// self-contained when only `MarketContext` is in scope.
fn market_context_bearish_proxy(market_context: &MarketContext) -> f64 {
    match market_context.options_data.gamma_bias {
        GammaBias::Positive => 10.0,
        GammaBias::Negative => 90.0,
        GammaBias::Neutral => 50.0,
    }
}

/// Regime phase events carry their cycle label in `event.name`
/// (ACCUMULATION/MARKUP/DISTRIBUTION/MARKDOWN); unrecognized names do not
/// constrain the regime gate.
pub fn phase_name_from_event(name: &str) -> Option<PhaseName> {
    match name.to_uppercase().as_str() {
        "ACCUMULATION" => Some(PhaseName::Accumulation),
        "MARKUP" => Some(PhaseName::Markup),
        "DISTRIBUTION" => Some(PhaseName::Distribution),
        "MARKDOWN" => Some(PhaseName::Markdown),
        _ => None,
    }
}
