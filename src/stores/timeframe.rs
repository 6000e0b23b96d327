// =============================================================================
// TimeframeStore — Map (ticker, timeframe) -> latest StoredSignal with TTL
// =============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::model::{StoredSignal, Timeframe};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeframeKey {
    pub ticker: String,
    pub timeframe: Timeframe,
}

/// Read-mostly, write-latest-wins store of the most recent signal per
/// (ticker, timeframe).
pub struct TimeframeStore {
    entries: RwLock<HashMap<TimeframeKey, StoredSignal>>,
}

impl TimeframeStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite the entry for `key`. A write with
    /// `received_at` older than the existing entry's is silently dropped
    /// (out-of-order protection).
    pub fn put(&self, key: TimeframeKey, signal: StoredSignal) {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&key) {
            if signal.received_at < existing.received_at {
                debug!(
                    ticker = %key.ticker,
                    timeframe = signal.signal.signal.timeframe.minutes(),
                    "dropped out-of-order timeframe write"
                );
                return;
            }
        }
        entries.insert(key, signal);
    }

    /// Return the entry for `key` if not expired, lazily removing it
    /// otherwise.
    pub fn get(&self, key: &TimeframeKey, now_millis: i64) -> Option<StoredSignal> {
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

    /// All non-expired entries for `ticker`, lazily evicting expired ones.
    pub fn active(&self, ticker: &str, now_millis: i64) -> Vec<(Timeframe, StoredSignal)> {
        let mut entries = self.entries.write();
        entries.retain(|_, v| now_millis < v.expires_at);
        entries
            .iter()
            .filter(|(k, _)| k.ticker == ticker)
            .map(|(k, v)| (k.timeframe, v.clone()))
            .collect()
    }
}

impl Default for TimeframeStore {
    fn default() -> Self {
        Self::new()
    }
}
