// =============================================================================
// ConfluenceCalculator — Weighted Multi-Timeframe Directional Score (§4.5)
// =============================================================================

use crate::config::EngineConfig;
use crate::model::{Side, StoredSignal, Timeframe};

#[derive(Debug, Clone)]
pub struct TimeframeContribution {
    pub timeframe: Timeframe,
    pub aligned: bool,
    pub weight: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone)]
pub struct ConfluenceBreakdown {
    pub direction: Side,
    pub score: f64,
    pub aligned_timeframes: Vec<Timeframe>,
    pub misaligned_timeframes: Vec<Timeframe>,
    pub per_timeframe: Vec<TimeframeContribution>,
}

#[derive(Debug, Clone, Copy)]
pub struct DominantDirection {
    pub direction: Option<Side>,
    pub score: f64,
}

pub struct ConfluenceCalculator;

impl ConfluenceCalculator {
    /// `score(D) = 100 * sum(w(tf) for active[tf].type == D)` (P2).
    pub fn score(
        active: &[(Timeframe, StoredSignal)],
        direction: Side,
        config: &EngineConfig,
    ) -> f64 {
        active
            .iter()
            .filter(|(_, stored)| stored.signal.signal.signal_type == direction)
            .map(|(tf, _)| config.confluence_weight(*tf))
            .sum::<f64>()
            * 100.0
    }

    /// Whichever of LONG/SHORT scores higher; ties broken by
    /// `config.tie_break_direction` (Open Question c). Empty input yields
    /// `{direction: None, score: 0.0}`.
    pub fn dominant_direction(
        active: &[(Timeframe, StoredSignal)],
        config: &EngineConfig,
    ) -> DominantDirection {
        if active.is_empty() {
            return DominantDirection {
                direction: None,
                score: 0.0,
            };
        }

        let long_score = Self::score(active, Side::Long, config);
        let short_score = Self::score(active, Side::Short, config);

        if long_score == 0.0 && short_score == 0.0 {
            return DominantDirection {
                direction: None,
                score: 0.0,
            };
        }

        let direction = if long_score > short_score {
            Side::Long
        } else if short_score > long_score {
            Side::Short
        } else {
            config.tie_break_direction
        };

        let score = match direction {
            Side::Long => long_score,
            Side::Short => short_score,
        };

        DominantDirection {
            direction: Some(direction),
            score,
        }
    }

    /// Per-timeframe breakdown for `direction`. Contributions sum to the
    /// same value `score()` returns for that direction.
    pub fn breakdown(
        active: &[(Timeframe, StoredSignal)],
        direction: Side,
        config: &EngineConfig,
    ) -> ConfluenceBreakdown {
        let mut per_timeframe = Vec::with_capacity(active.len());
        let mut aligned_timeframes = Vec::new();
        let mut misaligned_timeframes = Vec::new();
        let mut score = 0.0;

        for (tf, stored) in active {
            let weight = config.confluence_weight(*tf);
            let aligned = stored.signal.signal.signal_type == direction;
            let contribution = if aligned { weight * 100.0 } else { 0.0 };
            if aligned {
                aligned_timeframes.push(*tf);
            } else {
                misaligned_timeframes.push(*tf);
            }
            score += contribution;
            per_timeframe.push(TimeframeContribution {
                timeframe: *tf,
                aligned,
                weight,
                contribution,
            });
        }

        ConfluenceBreakdown {
            direction,
            score,
            aligned_timeframes,
            misaligned_timeframes,
            per_timeframe,
        }
    }
}
