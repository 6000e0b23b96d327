// =============================================================================
// ConfigRegistry — Frozen, Content-Hashed Configuration
// =============================================================================
//
// Unlike the hot-reloadable runtime configuration this engine's ancestor
// used, `ConfigRegistry` is loaded once and frozen: no component holds a
// `&mut EngineConfig` after construction. Every `DecisionPacket` carries
// the resulting `config_hash` so a decision can always be traced back to
// the exact matrices that produced it.
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::EngineError;
use crate::model::{Side, Timeframe};
use crate::session::{DayOfWeek, MarketSession};

/// Semver string recorded on every `DecisionPacket`.
pub const ENGINE_VERSION: &str = "1.0.0";

fn default_confluence_weights() -> BTreeMap<u16, f64> {
    BTreeMap::from([(240, 0.40), (60, 0.25), (30, 0.15), (15, 0.10), (5, 0.07), (3, 0.03)])
}

fn default_quality_multipliers() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("EXTREME".to_string(), 1.3),
        ("HIGH".to_string(), 1.1),
        ("MEDIUM".to_string(), 1.0),
    ])
}

fn default_htf_alignment_multipliers() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("PERFECT".to_string(), 1.3),
        ("GOOD".to_string(), 1.15),
        ("WEAK".to_string(), 0.85),
        ("COUNTER".to_string(), 0.5),
    ])
}

fn default_session_multipliers() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("OPEN".to_string(), 0.9),
        ("MIDDAY".to_string(), 1.0),
        ("POWER_HOUR".to_string(), 0.85),
        ("AFTERHOURS".to_string(), 0.5),
        ("PREMARKET".to_string(), 0.5),
        ("WEEKEND".to_string(), 0.5),
    ])
}

fn default_day_multipliers() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("MONDAY".to_string(), 0.95),
        ("TUESDAY".to_string(), 1.1),
        ("WEDNESDAY".to_string(), 1.0),
        ("THURSDAY".to_string(), 0.95),
        ("FRIDAY".to_string(), 0.85),
        ("SATURDAY".to_string(), 0.85),
        ("SUNDAY".to_string(), 0.85),
    ])
}

fn default_position_multiplier_min() -> f64 {
    0.5
}
fn default_position_multiplier_max() -> f64 {
    3.0
}
fn default_confluence_threshold() -> f64 {
    60.0
}
fn default_htf_min_ai_score() -> f64 {
    6.0
}
fn default_max_spread_bps() -> f64 {
    12.0
}
fn default_max_atr_spike() -> f64 {
    2.5
}
fn default_min_depth_score() -> f64 {
    30.0
}
fn default_structural_min_ai_score() -> f64 {
    7.0
}
fn default_gamma_override_alignment_pct() -> f64 {
    85.0
}
fn default_provider_timeout_ms() -> u64 {
    600
}
fn default_provider_max_retries() -> u32 {
    2
}
fn default_tie_break_direction() -> Side {
    Side::Long
}

/// Thresholds for `CONFIDENCE_THRESHOLDS`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    #[serde(default = "default_execute_threshold")]
    pub execute: f64,
    #[serde(default = "default_wait_threshold")]
    pub wait: f64,
    #[serde(default)]
    pub skip: f64,
}

fn default_execute_threshold() -> f64 {
    80.0
}
fn default_wait_threshold() -> f64 {
    65.0
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            execute: default_execute_threshold(),
            wait: default_wait_threshold(),
            skip: 0.0,
        }
    }
}

/// The full set of matrices, thresholds, and gate parameters (§4.1).
///
/// Deliberately not `Clone`-cheap: this is built once at init and wrapped
/// in a `ConfigRegistry`, never copied per-decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_confluence_weights")]
    pub confluence_weights: BTreeMap<u16, f64>,

    #[serde(default = "default_quality_multipliers")]
    pub quality_multipliers: BTreeMap<String, f64>,

    #[serde(default = "default_htf_alignment_multipliers")]
    pub htf_alignment_multipliers: BTreeMap<String, f64>,

    #[serde(default = "default_session_multipliers")]
    pub session_multipliers: BTreeMap<String, f64>,

    #[serde(default = "default_day_multipliers")]
    pub day_multipliers: BTreeMap<String, f64>,

    #[serde(default = "default_position_multiplier_min")]
    pub position_multiplier_min: f64,
    #[serde(default = "default_position_multiplier_max")]
    pub position_multiplier_max: f64,
    #[serde(default = "default_confluence_threshold")]
    pub confluence_threshold: f64,
    #[serde(default = "default_htf_min_ai_score")]
    pub htf_min_ai_score: f64,
    #[serde(default = "default_max_spread_bps")]
    pub max_spread_bps: f64,
    #[serde(default = "default_max_atr_spike")]
    pub max_atr_spike: f64,
    #[serde(default = "default_min_depth_score")]
    pub min_depth_score: f64,
    #[serde(default = "default_structural_min_ai_score")]
    pub structural_min_ai_score: f64,
    #[serde(default = "default_gamma_override_alignment_pct")]
    pub gamma_override_alignment_pct: f64,

    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    #[serde(default = "default_provider_max_retries")]
    pub provider_max_retries: u32,

    #[serde(default)]
    pub confidence_thresholds: ConfidenceThresholds,

    /// Open Question resolution: dominantDirection tie-break, made
    /// configurable per the Design Notes rather than hard-coded LONG.
    #[serde(default = "default_tie_break_direction")]
    pub tie_break_direction: Side,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confluence_weights: default_confluence_weights(),
            quality_multipliers: default_quality_multipliers(),
            htf_alignment_multipliers: default_htf_alignment_multipliers(),
            session_multipliers: default_session_multipliers(),
            day_multipliers: default_day_multipliers(),
            position_multiplier_min: default_position_multiplier_min(),
            position_multiplier_max: default_position_multiplier_max(),
            confluence_threshold: default_confluence_threshold(),
            htf_min_ai_score: default_htf_min_ai_score(),
            max_spread_bps: default_max_spread_bps(),
            max_atr_spike: default_max_atr_spike(),
            min_depth_score: default_min_depth_score(),
            structural_min_ai_score: default_structural_min_ai_score(),
            gamma_override_alignment_pct: default_gamma_override_alignment_pct(),
            provider_timeout_ms: default_provider_timeout_ms(),
            provider_max_retries: default_provider_max_retries(),
            confidence_thresholds: ConfidenceThresholds::default(),
            tie_break_direction: default_tie_break_direction(),
        }
    }
}

impl EngineConfig {
    /// Tiered lookup for `CONFLUENCE_MULTIPLIERS`. Boundary resolution
    /// (Open Question): `score == 60.0` uses the inclusive `>=` arm and
    /// receives the `1.0` tier, matching the EXECUTE threshold semantics.
    pub fn confluence_multiplier(&self, score: f64) -> f64 {
        if score >= 90.0 {
            2.5
        } else if score >= 80.0 {
            2.0
        } else if score >= 70.0 {
            1.5
        } else if score >= 60.0 {
            1.0
        } else if score >= 50.0 {
            0.7
        } else {
            0.5
        }
    }

    pub fn rr_multiplier(&self, rr: f64) -> f64 {
        if rr >= 5.0 {
            1.2
        } else if rr >= 4.0 {
            1.15
        } else if rr >= 3.0 {
            1.1
        } else if rr >= 2.0 {
            1.0
        } else if rr >= 1.5 {
            0.85
        } else {
            0.5
        }
    }

    pub fn volume_multiplier(&self, volume_vs_avg: f64) -> f64 {
        if volume_vs_avg >= 1.5 {
            1.1
        } else if volume_vs_avg >= 0.8 {
            1.0
        } else {
            0.7
        }
    }

    pub fn trend_multiplier(&self, trend_strength: f64) -> f64 {
        if trend_strength >= 80.0 {
            1.2
        } else if trend_strength >= 60.0 {
            1.0
        } else {
            0.8
        }
    }

    pub fn quality_multiplier(&self, quality: &str) -> f64 {
        *self.quality_multipliers.get(quality).unwrap_or(&1.0)
    }

    pub fn htf_alignment_multiplier(&self, alignment: &str) -> f64 {
        *self.htf_alignment_multipliers.get(alignment).unwrap_or(&1.0)
    }

    pub fn session_multiplier(&self, session: MarketSession) -> f64 {
        *self
            .session_multipliers
            .get(session.as_str())
            .unwrap_or(&1.0)
    }

    pub fn day_multiplier(&self, day: DayOfWeek) -> f64 {
        *self.day_multipliers.get(day.as_str()).unwrap_or(&1.0)
    }

    pub fn confluence_weight(&self, tf: Timeframe) -> f64 {
        *self.confluence_weights.get(&tf.minutes()).unwrap_or(&0.0)
    }

    /// Tiered `PHASE_BOOSTS.confidence` table. Open Question resolution:
    /// the tiered table is authoritative here (see DESIGN.md); there is no
    /// fallback to a flat 0.20 below the 70 tier.
    pub fn phase_confidence_boost(&self, confidence_score: f64) -> f64 {
        if confidence_score >= 90.0 {
            0.15
        } else if confidence_score >= 80.0 {
            0.10
        } else if confidence_score >= 70.0 {
            0.05
        } else {
            0.0
        }
    }

    /// `PHASE_BOOSTS.position`: 0.10 when confidence >= 70 and HTF-aligned.
    pub fn phase_position_boost(&self, confidence_score: f64, htf_alignment: bool) -> f64 {
        if confidence_score >= 70.0 && htf_alignment {
            0.10
        } else {
            0.0
        }
    }
}

/// An `EngineConfig` wrapped so nothing outside this module can mutate it
/// after construction, with its content hash precomputed.
#[derive(Debug, Clone)]
pub struct ConfigRegistry {
    config: EngineConfig,
    hash: String,
}

impl ConfigRegistry {
    /// Freeze `config`, computing its content hash.
    pub fn freeze(config: EngineConfig) -> Self {
        let hash = Self::content_hash(&config);
        info!(config_hash = %hash, "engine config frozen");
        Self { config, hash }
    }

    /// Freeze the built-in defaults.
    pub fn default_frozen() -> Self {
        Self::freeze(EngineConfig::default())
    }

    /// Load an override file, merged onto defaults via serde's `#[serde(default)]`
    /// fields, then freeze it. Absent file or invalid JSON is a caller error,
    /// not a panic.
    pub fn load_from_json(raw: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(raw)
            .map_err(|e| EngineError::Internal(format!("invalid config JSON: {e}")))?;
        Ok(Self::freeze(config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_hash(&self) -> &str {
        &self.hash
    }

    /// First 16 hex chars of SHA-256 over the canonical (sorted-key) JSON
    /// encoding of `config`.
    fn content_hash(config: &EngineConfig) -> String {
        let canonical = serde_json::to_value(config)
            .and_then(|v| serde_json::to_string(&Self::canonicalize(v)))
            .expect("EngineConfig always serializes");
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let digest = hasher.finalize();
        hex::encode(digest)[..16].to_string()
    }

    /// Recursively re-key JSON objects through a `BTreeMap` so serialization
    /// order never depends on `HashMap` iteration order.
    fn canonicalize(value: serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let sorted: BTreeMap<String, serde_json::Value> = map
                    .into_iter()
                    .map(|(k, v)| (k, Self::canonicalize(v)))
                    .collect();
                serde_json::to_value(sorted).expect("BTreeMap<String, Value> always serializes")
            }
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Self::canonicalize).collect())
            }
            other => other,
        }
    }

    /// Demonstrates the documented failure mode: any attempt to install a
    /// new configuration over an already-frozen registry is rejected.
    /// `ConfigRegistry` itself never exposes a mutator, so in practice this
    /// only fires when calling code explicitly tries to re-freeze.
    pub fn attempt_refreeze(&self, _replacement: EngineConfig) -> Result<(), EngineError> {
        Err(EngineError::ImmutabilityViolation(
            "configuration is frozen after load; construct a new ConfigRegistry instead"
                .to_string(),
        ))
    }
}
