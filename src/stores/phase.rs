// =============================================================================
// PhaseStore — Map (symbol, tf_role) -> latest StoredPhase with TTL
// =============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::model::{StoredPhase, TfRole};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhaseKey {
    pub ticker: String,
    pub tf_role: TfRole,
}

pub struct PhaseStore {
    entries: RwLock<HashMap<PhaseKey, StoredPhase>>,
}

impl PhaseStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn put(&self, key: PhaseKey, phase: StoredPhase) {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&key) {
            if phase.received_at < existing.received_at {
                debug!(ticker = %key.ticker, "dropped out-of-order phase write");
                return;
            }
        }
        entries.insert(key, phase);
    }

    pub fn get(&self, key: &PhaseKey, now_millis: i64) -> Option<StoredPhase> {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if now_millis < entry.expires_at => Some(entry.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn active(&self, ticker: &str, now_millis: i64) -> Vec<(TfRole, StoredPhase)> {
        let mut entries = self.entries.write();
        entries.retain(|_, v| now_millis < v.expires_at);
        entries
            .iter()
            .filter(|(k, _)| k.ticker == ticker)
            .map(|(k, v)| (k.tf_role, v.clone()))
            .collect()
    }
}

impl Default for PhaseStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;

    fn sample_phase(received_at: i64, decay_minutes: i64) -> StoredPhase {
        StoredPhase::new(
            PhaseEvent {
                meta: PhaseMeta {
                    engine: "SATY_PO".to_string(),
                    event_id: "evt-1".to_string(),
                    event_type: EventType::RegimePhaseEntry,
                    generated_at: received_at,
                },
                instrument: Instrument {
                    exchange: "CME".to_string(),
                    ticker: "SPY".to_string(),
                    current_price: 500.0,
                },
                timeframe: PhaseTimeframe {
                    value: 240,
                    tf_role: TfRole::Regime,
                },
                event: PhaseEventDetail {
                    name: "entry".to_string(),
                    directional_implication: DirectionalImplication::UpsidePotential,
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
                    confidence_score: 85.0,
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
            },
            received_at,
        )
    }

    #[test]
    fn ttl_derives_from_time_decay_minutes() {
        let store = PhaseStore::new();
        let key = PhaseKey {
            ticker: "SPY".to_string(),
            tf_role: TfRole::Regime,
        };
        store.put(key.clone(), sample_phase(1_000, 30));
        let expires_at = 1_000 + 30 * 60 * 1000;
        assert!(store.get(&key, expires_at - 1).is_some());
        assert!(store.get(&key, expires_at).is_none());
    }
}
