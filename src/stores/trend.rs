// =============================================================================
// TrendStore — Map ticker -> latest StoredTrend with TTL
// =============================================================================
//
// Precomputes the alignment derivation at write time (via
// `TrendSnapshot::new`); the stored snapshot always carries a consistent,
// already-derived `alignment` block.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::model::StoredTrend;

pub struct TrendStore {
    entries: RwLock<HashMap<String, StoredTrend>>,
}

impl TrendStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn put(&self, ticker: String, trend: StoredTrend) {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&ticker) {
            if trend.received_at < existing.received_at {
                debug!(ticker, "dropped out-of-order trend write");
                return;
            }
        }
        entries.insert(ticker, trend);
    }

    pub fn get(&self, ticker: &str, now_millis: i64) -> Option<StoredTrend> {
        let mut entries = self.entries.write();
        match entries.get(ticker) {
            Some(entry) if now_millis < entry.expires_at => Some(entry.clone()),
            Some(_) => {
                entries.remove(ticker);
                None
            }
            None => None,
        }
    }

    /// Number of tickers with a non-expired snapshot, pruning expired
    /// entries along the way.
    pub fn active_count(&self, now_millis: i64) -> usize {
        let mut entries = self.entries.write();
        entries.retain(|_, entry| now_millis < entry.expires_at);
        entries.len()
    }
}

impl Default for TrendStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use std::collections::HashMap as StdHashMap;

    fn snapshot(ticker: &str, received_at: i64) -> StoredTrend {
        let mut timeframes = StdHashMap::new();
        for key in TrendTimeframeKey::ALL {
            timeframes.insert(
                key,
                TrendTimeframeState {
                    direction: TrendDirection::Bullish,
                    open: 100.0,
                    close: 101.0,
                },
            );
        }
        StoredTrend::new(
            TrendSnapshot::new(ticker, "CME", received_at, 101.0, timeframes),
            received_at,
        )
    }

    #[test]
    fn ttl_is_sixty_minutes() {
        let store = TrendStore::new();
        store.put("SPY".to_string(), snapshot("SPY", 1_000));
        let expires_at = 1_000 + 60 * 60 * 1000;
        assert!(store.get("SPY", expires_at - 1).is_some());
        assert!(store.get("SPY", expires_at).is_none());
    }

    #[test]
    fn full_bullish_alignment_scores_100() {
        let store = TrendStore::new();
        store.put("SPY".to_string(), snapshot("SPY", 1_000));
        let entry = store.get("SPY", 1_001).unwrap();
        assert_eq!(entry.snapshot.alignment.score, 100.0);
        assert_eq!(entry.snapshot.alignment.strength, AlignmentStrength::Strong);
    }
}
