// =============================================================================
// PositionSizer — HTF Alignment + Multiplicative Factor Pipeline (§4.6)
// =============================================================================
//
// HTF alignment classification follows the same "stacked bool rule with a
// human-readable reason" shape as the teacher's `htf_analysis::analyze`
// (15M/1H EMA alignment -> buy_allowed/sell_signal), generalized here to the
// spec's 4H/1H multi-source alignment check and PERFECT/GOOD/WEAK/COUNTER
// tiering.
// =============================================================================

use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::model::{
    DirectionalImplication, EnrichedSignal, HtfAlignment, MultiplierBreakdown, Side, StoredPhase,
    StoredSignal, TfRole, Timeframe, TrendAlignmentDerived,
};

pub struct PositionSizer;

impl PositionSizer {
    /// Determine HTF alignment per §4.6's three-rule algorithm.
    pub fn htf_alignment(
        entry_signal: &EnrichedSignal,
        active_signals: &HashMap<Timeframe, StoredSignal>,
        active_phases: &[StoredPhase],
        config: &EngineConfig,
    ) -> HtfAlignment {
        let direction = entry_signal.signal.signal_type;

        let h4_aligned = active_signals.get(&Timeframe::Tf240).is_some_and(|s| {
            s.signal.signal.signal_type == direction && s.signal.signal.ai_score >= config.htf_min_ai_score
        }) || entry_signal.mtf_context.h4_bias == direction
            || active_phases.iter().any(|p| {
                matches!(p.phase.timeframe.tf_role, TfRole::Regime | TfRole::Bias)
                    && matches_direction(p.phase.event.directional_implication, direction)
            });

        let h1_aligned = active_signals.get(&Timeframe::Tf60).is_some_and(|s| {
            s.signal.signal.signal_type == direction && s.signal.signal.ai_score >= config.htf_min_ai_score
        }) || entry_signal.mtf_context.h1_bias == direction;

        let counter = entry_signal.mtf_context.h4_bias != direction
            && entry_signal.mtf_context.h1_bias != direction;

        if h4_aligned && h1_aligned {
            HtfAlignment::Perfect
        } else if counter {
            HtfAlignment::Counter
        } else if h4_aligned || h1_aligned {
            HtfAlignment::Good
        } else {
            HtfAlignment::Weak
        }
    }

    /// Run the multiplicative pipeline in the documented order and clamp
    /// the result to `[position_multiplier_min, position_multiplier_max]`.
    ///
    /// Boosts are taken as the per-source maximum across active
    /// phases/trends, not summed across sources; within one trend, the
    /// position boost (STRONG alignment) and the confidence boost (HTF-bias
    /// match) do add to each other.
    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        entry_signal: &EnrichedSignal,
        confluence_score: f64,
        htf_alignment: HtfAlignment,
        active_phases: &[StoredPhase],
        trend: Option<&TrendAlignmentDerived>,
        config: &EngineConfig,
    ) -> (MultiplierBreakdown, u32, bool) {
        let confluence_multiplier = config.confluence_multiplier(confluence_score);
        let quality_multiplier = config.quality_multiplier(quality_str(entry_signal));
        let htf_alignment_multiplier = config.htf_alignment_multiplier(htf_alignment_str(htf_alignment));
        let rr_multiplier = config.rr_multiplier(entry_signal.risk.rr_ratio_t1);
        let volume_multiplier = config.volume_multiplier(entry_signal.market_context.volume_vs_avg);
        let trend_multiplier = config.trend_multiplier(entry_signal.trend.strength);
        let session_multiplier = config.session_multiplier(entry_signal.time_context.market_session);
        let day_multiplier = config.day_multiplier(entry_signal.time_context.day_of_week);

        let direction = entry_signal.signal.signal_type;

        let phase_confidence_boost = active_phases
            .iter()
            .map(|p| config.phase_confidence_boost(p.phase.confidence.confidence_score))
            .fold(0.0_f64, f64::max);
        let phase_position_boost = active_phases
            .iter()
            .map(|p| config.phase_position_boost(p.phase.confidence.confidence_score, p.phase.confidence.htf_alignment))
            .fold(0.0_f64, f64::max);

        let trend_alignment_boost = trend
            .map(|t| {
                let position = if t.strength == crate::model::AlignmentStrength::Strong {
                    0.30
                } else {
                    0.0
                };
                let confidence = if matches!(t.htf_bias, crate::model::TrendDirection::Bullish) && direction == Side::Long
                    || matches!(t.htf_bias, crate::model::TrendDirection::Bearish) && direction == Side::Short
                {
                    0.15
                } else {
                    0.0
                };
                position + confidence
            })
            .unwrap_or(0.0);

        let raw = confluence_multiplier
            * quality_multiplier
            * htf_alignment_multiplier
            * rr_multiplier
            * volume_multiplier
            * trend_multiplier
            * session_multiplier
            * day_multiplier
            * (1.0 + phase_confidence_boost)
            * (1.0 + phase_position_boost)
            * (1.0 + trend_alignment_boost);

        let final_multiplier = raw.clamp(config.position_multiplier_min, config.position_multiplier_max);
        let should_skip = raw < config.position_multiplier_min;

        let recommended_contracts = if should_skip {
            0
        } else {
            ((entry_signal.risk.recommended_contracts as f64 * final_multiplier).round() as u32).max(1)
        };

        let breakdown = MultiplierBreakdown {
            confluence_multiplier,
            quality_multiplier,
            htf_alignment_multiplier,
            rr_multiplier,
            volume_multiplier,
            trend_multiplier,
            session_multiplier,
            day_multiplier,
            phase_confidence_boost,
            phase_position_boost,
            trend_alignment_boost,
            final_multiplier,
        };

        (breakdown, recommended_contracts, should_skip)
    }
}

fn quality_str(signal: &EnrichedSignal) -> &'static str {
    match signal.signal.quality {
        crate::model::Quality::Extreme => "EXTREME",
        crate::model::Quality::High => "HIGH",
        crate::model::Quality::Medium => "MEDIUM",
    }
}

fn htf_alignment_str(alignment: HtfAlignment) -> &'static str {
    match alignment {
        HtfAlignment::Perfect => "PERFECT",
        HtfAlignment::Good => "GOOD",
        HtfAlignment::Weak => "WEAK",
        HtfAlignment::Counter => "COUNTER",
    }
}

fn matches_direction(implication: DirectionalImplication, direction: Side) -> bool {
    match (implication, direction) {
        (DirectionalImplication::UpsidePotential, Side::Long) => true,
        (DirectionalImplication::DownsidePotential, Side::Short) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use std::collections::HashMap as StdHashMap;

    fn base_signal(direction: Side, h4_bias: Side, h1_bias: Side) -> EnrichedSignal {
        EnrichedSignal {
            signal: SignalCore {
                signal_type: direction,
                timeframe: Timeframe::Tf15,
                quality: Quality::Extreme,
                ai_score: 9.0,
                timestamp: 1_000,
                bar_time: 1_000,
            },
            instrument: Instrument {
                exchange: "CME".to_string(),
                ticker: "SPY".to_string(),
                current_price: 450.0,
            },
            entry: EntryPlan {
                price: 450.0,
                stop_loss: 448.0,
                target_1: 452.0,
                target_2: 454.0,
                stop_reason: "structure".to_string(),
            },
            risk: RiskPlan {
                amount: 100.0,
                rr_ratio_t1: 3.0,
                rr_ratio_t2: 4.0,
                stop_distance_pct: 0.5,
                recommended_shares: 10.0,
                recommended_contracts: 2,
                position_multiplier: 1.0,
                account_risk_pct: 1.0,
                max_loss_dollars: 100.0,
            },
            market_context: SignalMarketContext {
                vwap: 449.5,
                pmh: 451.0,
                pml: 447.0,
                day_open: 448.0,
                day_change_pct: 0.4,
                price_vs_vwap_pct: 0.1,
                distance_to_pmh: 1.0,
                distance_to_pml: 3.0,
                atr: 1.5,
                volume_vs_avg: 1.6,
                candle_direction: CandleDirection::Green,
                candle_size_atr: 0.5,
            },
            trend: TrendContext {
                ema_8: 449.0,
                ema_21: 448.0,
                ema_50: 445.0,
                alignment: TrendAlignment::Bullish,
                strength: 85.0,
                rsi: 60.0,
                macd_signal: 0.2,
            },
            mtf_context: MtfContext {
                h4_bias,
                h4_rsi: 55.0,
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
                market_session: MarketSession::Midday,
                day_of_week: DayOfWeek::Tuesday,
            },
        }
    }

    #[test]
    fn perfect_alignment_when_both_htf_match() {
        let config = EngineConfig::default();
        let signal = base_signal(Side::Long, Side::Long, Side::Long);
        let alignment = PositionSizer::htf_alignment(&signal, &StdHashMap::new(), &[], &config);
        assert_eq!(alignment, HtfAlignment::Perfect);
    }

    #[test]
    fn counter_alignment_when_both_htf_disagree() {
        let config = EngineConfig::default();
        let signal = base_signal(Side::Long, Side::Short, Side::Short);
        let alignment = PositionSizer::htf_alignment(&signal, &StdHashMap::new(), &[], &config);
        assert_eq!(alignment, HtfAlignment::Counter);
    }

    #[test]
    fn final_multiplier_is_clamped_at_upper_bound() {
        let config = EngineConfig::default();
        let signal = base_signal(Side::Long, Side::Long, Side::Long);
        let (breakdown, contracts, should_skip) =
            PositionSizer::compute(&signal, 90.0, HtfAlignment::Perfect, &[], None, &config);
        assert_eq!(breakdown.final_multiplier, 3.0);
        assert!(!should_skip);
        assert!(contracts >= 1);
    }

    #[test]
    fn counter_trend_pushes_multiplier_down() {
        let config = EngineConfig::default();
        let signal = base_signal(Side::Long, Side::Short, Side::Short);
        let (breakdown, _, _) =
            PositionSizer::compute(&signal, 60.0, HtfAlignment::Counter, &[], None, &config);
        assert_eq!(breakdown.htf_alignment_multiplier, 0.5);
    }
}
