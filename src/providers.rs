// =============================================================================
// Provider Clients — Outbound Market-Data Contracts (§6)
// =============================================================================
//
// Thin `reqwest`-backed clients for the three outbound provider contracts.
// Each returns a typed `ProviderError` on failure; none of them ever
// retries internally — retry/backoff is `MarketContextBuilder`'s job so it
// can stay within the shared per-provider budget.
// =============================================================================

use serde::Deserialize;
use tracing::instrument;

use crate::error::ProviderError;

#[derive(Debug, Clone, Deserialize)]
pub struct OptionsResponse {
    pub put_call_ratio: f64,
    pub iv_percentile: f64,
    pub gamma_bias: String,
}

#[derive(Debug, Clone, Deserialize)]
struct AtrField {
    value: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct RvField {
    value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsResponse {
    atr: AtrField,
    #[serde(rename = "realizedVolatility")]
    realized_volatility: RvField,
    pub trend_slope: f64,
}

impl StatsResponse {
    pub fn atr_value(&self) -> f64 {
        self.atr.value
    }
    pub fn rv_value(&self) -> f64 {
        self.realized_volatility.value
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiquidityResponse {
    #[serde(alias = "spreadBps")]
    pub spread_bps: Option<f64>,
    pub spread: Option<SpreadField>,
    #[serde(alias = "depthScore")]
    pub depth_score: Option<f64>,
    pub depth: Option<DepthField>,
    #[serde(alias = "tradeVelocity")]
    pub trade_velocity: Option<String>,
    pub velocity: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpreadField {
    pub bps: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepthField {
    pub score: f64,
}

impl LiquidityResponse {
    pub fn spread_bps_value(&self) -> Option<f64> {
        self.spread_bps.or_else(|| self.spread.as_ref().map(|s| s.bps))
    }
    pub fn depth_score_value(&self) -> Option<f64> {
        self.depth_score.or_else(|| self.depth.as_ref().map(|d| d.score))
    }
    pub fn trade_velocity_value(&self) -> Option<String> {
        self.trade_velocity.clone().or_else(|| self.velocity.clone())
    }
}

fn build_client(timeout_ms: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(timeout_ms))
        .build()
        .expect("failed to build reqwest client")
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    provider: &str,
) -> Result<T, ProviderError> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| ProviderError::network(provider, e.to_string()))?;

    let status = resp.status();
    if status.as_u16() == 429 {
        return Err(ProviderError::rate_limited(provider));
    }
    if !status.is_success() {
        return Err(ProviderError::api(provider, status.as_u16()));
    }

    resp.json::<T>()
        .await
        .map_err(|e| ProviderError::malformed(provider, e.to_string()))
}

/// Client for `optionsProvider(ticker)`. `None` when no API key was
/// configured at init — the caller treats this as "provider disabled" and
/// goes straight to FALLBACK without attempting a call.
pub struct OptionsClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OptionsClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout_ms: u64) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            client: build_client(timeout_ms),
        }
    }

    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self), name = "providers::options")]
    pub async fn fetch(&self, ticker: &str) -> Result<OptionsResponse, ProviderError> {
        let key = self.api_key.as_deref().ok_or_else(|| ProviderError {
            kind: crate::error::ProviderErrorKind::Api,
            provider: "options".to_string(),
            retryable: false,
            message: "no API key configured".to_string(),
        })?;
        let url = format!("{}/options/{ticker}?apiKey={key}", self.base_url);
        get_json(&self.client, &url, "options").await
    }
}

pub struct StatsClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl StatsClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout_ms: u64) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            client: build_client(timeout_ms),
        }
    }

    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self), name = "providers::stats")]
    pub async fn fetch(&self, ticker: &str) -> Result<StatsResponse, ProviderError> {
        let key = self.api_key.as_deref().ok_or_else(|| ProviderError {
            kind: crate::error::ProviderErrorKind::Api,
            provider: "stats".to_string(),
            retryable: false,
            message: "no API key configured".to_string(),
        })?;
        let url = format!("{}/stats/{ticker}?apiKey={key}", self.base_url);
        get_json(&self.client, &url, "stats").await
    }
}

pub struct LiquidityClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl LiquidityClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout_ms: u64) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            client: build_client(timeout_ms),
        }
    }

    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self), name = "providers::liquidity")]
    pub async fn fetch(&self, ticker: &str) -> Result<LiquidityResponse, ProviderError> {
        let key = self.api_key.as_deref().ok_or_else(|| ProviderError {
            kind: crate::error::ProviderErrorKind::Api,
            provider: "liquidity".to_string(),
            retryable: false,
            message: "no API key configured".to_string(),
        })?;
        let url = format!("{}/liquidity/{ticker}?apiKey={key}", self.base_url);
        get_json(&self.client, &url, "liquidity").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liquidity_response_prefers_flat_fields() {
        let resp: LiquidityResponse = serde_json::from_str(
            r#"{"spreadBps": 5.0, "depthScore": 60.0, "tradeVelocity": "NORMAL"}"#,
        )
        .unwrap();
        assert_eq!(resp.spread_bps_value(), Some(5.0));
        assert_eq!(resp.depth_score_value(), Some(60.0));
        assert_eq!(resp.trade_velocity_value().as_deref(), Some("NORMAL"));
    }

    #[test]
    fn liquidity_response_falls_back_to_nested_fields() {
        let resp: LiquidityResponse = serde_json::from_str(
            r#"{"spread": {"bps": 8.0}, "depth": {"score": 40.0}, "velocity": "FAST"}"#,
        )
        .unwrap();
        assert_eq!(resp.spread_bps_value(), Some(8.0));
        assert_eq!(resp.depth_score_value(), Some(40.0));
        assert_eq!(resp.trade_velocity_value().as_deref(), Some("FAST"));
    }

    #[test]
    fn disabled_client_has_no_api_key() {
        let client = OptionsClient::new("https://example.invalid", None, 600);
        assert!(!client.enabled());
    }
}
