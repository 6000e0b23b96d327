// =============================================================================
// Stores — Timeframe, Phase, Trend
// =============================================================================
//
// Each store is a read-mostly, write-latest-wins map with per-entry TTL.
// Mutation is confined to the store's own methods; no other component
// writes to them, matching the singleton-store pattern from the Design
// Notes (tests construct a private store per case instead of a shared
// global).
// =============================================================================

pub mod context;
pub mod phase;
pub mod timeframe;
pub mod trend;

pub use context::ContextStore;
pub use phase::{PhaseKey, PhaseStore};
pub use timeframe::{TimeframeKey, TimeframeStore};
pub use trend::TrendStore;
