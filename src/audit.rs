// =============================================================================
// AuditLog — Append-Only Ring Buffer of Receipts and Decisions
// =============================================================================
//
// Same cap-and-evict shape as the teacher's `AppState::push_decision` /
// `push_error`, but backed by a `VecDeque` and `pop_front` instead of
// `Vec::remove(0)` — the teacher's ring buffer is O(n) per eviction, which
// matters once this sits on every decision's hot path instead of firing
// occasionally on error.
// =============================================================================

use std::collections::VecDeque;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::model::DecisionPacket;

const MAX_RECEIPTS: usize = 500;
const MAX_DECISIONS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptEntry {
    pub request_id: String,
    pub source: String,
    pub accepted: bool,
    pub message: String,
    pub received_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub request_id: String,
    pub ticker: String,
    pub packet: DecisionPacket,
}

pub struct AuditLog {
    receipts: RwLock<VecDeque<ReceiptEntry>>,
    decisions: RwLock<VecDeque<DecisionEntry>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            receipts: RwLock::new(VecDeque::new()),
            decisions: RwLock::new(VecDeque::new()),
        }
    }

    pub fn record_receipt(&self, entry: ReceiptEntry) {
        let mut receipts = self.receipts.write();
        receipts.push_back(entry);
        while receipts.len() > MAX_RECEIPTS {
            receipts.pop_front();
        }
    }

    pub fn record_decision(&self, entry: DecisionEntry) {
        let mut decisions = self.decisions.write();
        decisions.push_back(entry);
        while decisions.len() > MAX_DECISIONS {
            decisions.pop_front();
        }
    }

    /// Copy-out snapshot of the most recent receipts, newest last.
    pub fn recent_receipts(&self) -> Vec<ReceiptEntry> {
        self.receipts.read().iter().cloned().collect()
    }

    /// Copy-out snapshot of the most recent decisions, newest last.
    pub fn recent_decisions(&self) -> Vec<DecisionEntry> {
        self.decisions.read().iter().cloned().collect()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_receipts_at_max() {
        let log = AuditLog::new();
        for i in 0..(MAX_RECEIPTS + 10) {
            log.record_receipt(ReceiptEntry {
                request_id: format!("req-{i}"),
                source: "TRADINGVIEW_SIGNAL".to_string(),
                accepted: true,
                message: "ok".to_string(),
                received_at: i as i64,
            });
        }
        let receipts = log.recent_receipts();
        assert_eq!(receipts.len(), MAX_RECEIPTS);
        assert_eq!(receipts.first().unwrap().request_id, "req-10");
    }

    #[test]
    fn empty_log_returns_empty_snapshot() {
        let log = AuditLog::new();
        assert!(log.recent_decisions().is_empty());
    }
}
