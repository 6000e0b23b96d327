// =============================================================================
// Error Taxonomy
// =============================================================================
//
// Every error the core can raise maps to exactly one HTTP status at the
// thin API boundary (see `api::webhooks`). `ProviderError` is deliberately
// a separate type: it is confined to `market_context`/`providers` and is
// always absorbed into a FALLBACK section, never converted into an
// `EngineError`.
// =============================================================================

use thiserror::Error;

/// Errors the decision core can surface.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("VALIDATION_ERROR: {0}")]
    Validation(String),

    #[error("UNKNOWN_SOURCE: payload did not match any recognized source shape")]
    UnknownSource,

    #[error("SCHEMA_VALIDATION: {0}")]
    SchemaValidation(String),

    #[error("TIMEOUT_ERROR: decision budget exceeded ({0})")]
    Timeout(String),

    #[error("RATE_LIMIT_ERROR: {0}")]
    RateLimit(String),

    #[error("IMMUTABILITY_VIOLATION: {0}")]
    ImmutabilityViolation(String),

    #[error("INTERNAL_ERROR: {0}")]
    Internal(String),
}

impl EngineError {
    /// Machine-readable error code, as used in the wire-level `{error: ...}`
    /// field of §6 responses.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::UnknownSource => "UNKNOWN_SOURCE",
            EngineError::SchemaValidation(_) => "SCHEMA_VALIDATION",
            EngineError::Timeout(_) => "TIMEOUT_ERROR",
            EngineError::RateLimit(_) => "RATE_LIMIT_ERROR",
            EngineError::ImmutabilityViolation(_) => "IMMUTABILITY_VIOLATION",
            EngineError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the thin API layer maps this error to.
    pub fn status(&self) -> u16 {
        match self {
            EngineError::Validation(_) => 400,
            EngineError::UnknownSource => 400,
            EngineError::SchemaValidation(_) => 400,
            EngineError::Timeout(_) => 503,
            EngineError::RateLimit(_) => 429,
            EngineError::ImmutabilityViolation(_) => 500,
            EngineError::Internal(_) => 500,
        }
    }
}

/// The kind of failure a single provider call experienced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Timeout,
    Network,
    RateLimited,
    Api,
    Malformed,
}

/// Error from a single `MarketContextBuilder` provider call. Never escapes
/// `market_context`/`providers` — it is always absorbed into a FALLBACK
/// section by the builder.
#[derive(Debug, Error, Clone)]
#[error("provider error: {provider} ({kind:?}, retryable={retryable}): {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub provider: String,
    pub retryable: bool,
    pub message: String,
}

impl ProviderError {
    pub fn timeout(provider: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Timeout,
            provider: provider.into(),
            retryable: true,
            message: "provider call timed out".to_string(),
        }
    }

    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Network,
            provider: provider.into(),
            retryable: true,
            message: message.into(),
        }
    }

    pub fn rate_limited(provider: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::RateLimited,
            provider: provider.into(),
            retryable: true,
            message: "provider rate limit exceeded".to_string(),
        }
    }

    pub fn api(provider: impl Into<String>, status: u16) -> Self {
        Self {
            kind: ProviderErrorKind::Api,
            provider: provider.into(),
            retryable: status >= 500,
            message: format!("provider returned HTTP {status}"),
        }
    }

    pub fn malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Malformed,
            provider: provider.into(),
            retryable: false,
            message: message.into(),
        }
    }
}
