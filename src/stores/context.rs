// =============================================================================
// ContextStore — Optional Unified View
// =============================================================================
//
// Composes whatever partial updates have arrived for a ticker (a
// structural setup from STRAT_EXEC, a partial trend from MTF_DOTS, regime
// summaries derived from PhaseStore) into a single completeness-scored
// `DecisionContext`. `DecisionEngine` reads its `.structure` section to
// feed the gate pipeline's structural gate; the rest of the composed
// context serves the read-only `/phase/current`-style query surface.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::model::{DecisionContextMeta, DecisionContext, StructuralSetup, PartialTrendUpdate, AlignmentSummary, StructureSummary, ExecutionQuality, Instrument};
use crate::config::ENGINE_VERSION;

#[derive(Debug, Clone, Default)]
struct PartialContext {
    structural: Option<StructuralSetup>,
    partial_trend: Option<PartialTrendUpdate>,
    instrument: Option<Instrument>,
}

/// Per-ticker merge of whatever partial sources have reported in.
pub struct ContextStore {
    partials: RwLock<HashMap<String, PartialContext>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self {
            partials: RwLock::new(HashMap::new()),
        }
    }

    pub fn merge_structural(&self, setup: StructuralSetup) {
        let mut partials = self.partials.write();
        let entry = partials.entry(setup.ticker.clone()).or_default();
        entry.instrument = Some(Instrument {
            exchange: "UNKNOWN".to_string(),
            ticker: setup.ticker.clone(),
            current_price: 0.0,
        });
        entry.structural = Some(setup);
    }

    /// Merge an `MTF_DOTS` partial (3M/5M only) dot update for `ticker`.
    /// Does not touch `TrendStore` — that holds only full 8-timeframe
    /// snapshots from `TREND` payloads.
    pub fn merge_partial_trend(&self, ticker: &str, update: PartialTrendUpdate) {
        let mut partials = self.partials.write();
        let entry = partials.entry(ticker.to_string()).or_default();
        if entry.instrument.is_none() {
            entry.instrument = Some(Instrument {
                exchange: "UNKNOWN".to_string(),
                ticker: ticker.to_string(),
                current_price: 0.0,
            });
        }
        entry.partial_trend = Some(update);
    }

    /// Assemble a `DecisionContext` from whatever has been merged for
    /// `ticker`. `completeness` is the fraction of the four optional
    /// sections (regime, alignment, expert, structure) that are present —
    /// here only `structure` can ever be populated, since regime/expert
    /// come from the Phase/Timeframe stores which `DecisionEngine`
    /// consults directly.
    pub fn compose(&self, ticker: &str, now_millis: i64) -> Option<DecisionContext> {
        let partials = self.partials.read();
        let partial = partials.get(ticker)?;
        let instrument = partial.instrument.clone()?;

        let structure = partial.structural.as_ref().map(|s| StructureSummary {
            valid_setup: s.setup_valid,
            liquidity_ok: s.liquidity_ok,
            execution_quality: s.quality,
            ai_score: s.ai_score,
        });

        let present = [structure.is_some()].iter().filter(|b| **b).count();
        let completeness = present as f64 / 4.0;

        Some(DecisionContext {
            meta: DecisionContextMeta {
                engine_version: ENGINE_VERSION.to_string(),
                received_at: now_millis,
                completeness,
            },
            instrument,
            regime: None,
            alignment: AlignmentSummary {
                tf_states: HashMap::new(),
                bullish_pct: 0.0,
                bearish_pct: 0.0,
            },
            expert: None,
            structure,
        })
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}
