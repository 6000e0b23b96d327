// =============================================================================
// MarketContextBuilder — Parallel Fan-Out With Per-Provider Fallback
// =============================================================================
//
// Replaces the source's dual-constructor overload and `Promise.allSettled`
// fan-out (Design Notes): two named constructors (`from_keys`,
// `from_clients`) and three independently-written result slots. The three
// provider calls are launched with `tokio::join!` before any of them is
// awaited individually, so completion order never affects the assembled
// `MarketContext` — each slot has a single writer and the assembler only
// reads.
// =============================================================================

use std::time::{Duration, Instant};

use tracing::warn;

use crate::config::ConfigRegistry;
use crate::error::ProviderError;
use crate::model::{
    ContextSource, GammaBias, LiquidityData, MarketContext, MarketContextMeta, MarketStats,
    OptionsData, ProviderCallMeta,
};
use crate::providers::{LiquidityClient, OptionsClient, StatsClient};
use crate::rng::DeterministicRng;

/// Frozen fallback values substituted when a provider's section could not
/// be obtained (§4.4).
struct Fallback;
impl Fallback {
    const PUT_CALL_RATIO: f64 = 1.0;
    const IV_PERCENTILE: f64 = 50.0;
    const GAMMA_BIAS: GammaBias = GammaBias::Neutral;
    const ATR14: f64 = 2.0;
    const RV20: f64 = 0.2;
    const SPREAD_BPS: f64 = 15.0;
    const DEPTH_SCORE: f64 = 50.0;
    const TRADE_VELOCITY: &'static str = "NORMAL";
}

/// One of the three provider sources. `Disabled` models "no API key
/// configured at init" (§6 Environment): the section always uses FALLBACK
/// without attempting a call.
pub enum OptionsSource {
    Client(OptionsClient),
    Disabled,
}

pub enum StatsSource {
    Client(StatsClient),
    Disabled,
}

pub enum LiquiditySource {
    Client(LiquidityClient),
    Disabled,
}

pub struct MarketContextBuilder {
    options: OptionsSource,
    stats: StatsSource,
    liquidity: LiquiditySource,
    timeout: Duration,
    max_retries: u32,
    rng: DeterministicRng,
}

impl MarketContextBuilder {
    /// Construct from API keys, building `reqwest`-backed clients
    /// internally. A missing key disables that provider.
    pub fn from_keys(
        options_key: Option<String>,
        stats_key: Option<String>,
        liquidity_key: Option<String>,
        base_url: &str,
        registry: &ConfigRegistry,
        rng: DeterministicRng,
    ) -> Self {
        let timeout_ms = registry.config().provider_timeout_ms;
        Self {
            options: match options_key {
                Some(k) => OptionsSource::Client(OptionsClient::new(base_url, Some(k), timeout_ms)),
                None => OptionsSource::Disabled,
            },
            stats: match stats_key {
                Some(k) => StatsSource::Client(StatsClient::new(base_url, Some(k), timeout_ms)),
                None => StatsSource::Disabled,
            },
            liquidity: match liquidity_key {
                Some(k) => LiquiditySource::Client(LiquidityClient::new(base_url, Some(k), timeout_ms)),
                None => LiquiditySource::Disabled,
            },
            timeout: Duration::from_millis(timeout_ms),
            max_retries: registry.config().provider_max_retries,
            rng,
        }
    }

    /// Construct from already-built clients/sources — the injection point
    /// tests use to exercise real (but local) HTTP fixtures.
    pub fn from_clients(
        options: OptionsSource,
        stats: StatsSource,
        liquidity: LiquiditySource,
        timeout: Duration,
        max_retries: u32,
        rng: DeterministicRng,
    ) -> Self {
        Self {
            options,
            stats,
            liquidity,
            timeout,
            max_retries,
            rng,
        }
    }

    /// Fan out to all three providers concurrently and assemble a complete
    /// `MarketContext`. Never fails: a failed or disabled provider falls
    /// back to the frozen fallback table with `source = FALLBACK`.
    pub async fn build(&self, ticker: &str) -> (MarketContext, MarketContextMeta) {
        let (options_result, stats_result, liquidity_result) = tokio::join!(
            self.call_options(ticker),
            self.call_stats(ticker),
            self.call_liquidity(ticker),
        );

        let (options_data, options_meta) = match options_result {
            Ok((resp, duration)) => (
                OptionsData {
                    put_call_ratio: resp.put_call_ratio,
                    iv_percentile: resp.iv_percentile,
                    gamma_bias: parse_gamma_bias(&resp.gamma_bias),
                    source: ContextSource::Api,
                },
                ProviderCallMeta {
                    success: true,
                    source: ContextSource::Api,
                    error: None,
                    duration_ms: duration.as_millis() as u64,
                },
            ),
            Err((err, duration)) => {
                warn!(ticker, provider = "options", error = %err, "provider fallback");
                (
                    OptionsData {
                        put_call_ratio: Fallback::PUT_CALL_RATIO,
                        iv_percentile: Fallback::IV_PERCENTILE,
                        gamma_bias: Fallback::GAMMA_BIAS,
                        source: ContextSource::Fallback,
                    },
                    ProviderCallMeta {
                        success: false,
                        source: ContextSource::Fallback,
                        error: Some(err.to_string()),
                        duration_ms: duration.as_millis() as u64,
                    },
                )
            }
        };

        let (market_stats, stats_meta) = match stats_result {
            Ok((resp, duration)) => (
                MarketStats {
                    atr14: resp.atr_value(),
                    rv20: resp.rv_value(),
                    trend_slope: resp.trend_slope,
                    source: ContextSource::Api,
                },
                ProviderCallMeta {
                    success: true,
                    source: ContextSource::Api,
                    error: None,
                    duration_ms: duration.as_millis() as u64,
                },
            ),
            Err((err, duration)) => {
                warn!(ticker, provider = "stats", error = %err, "provider fallback");
                (
                    MarketStats {
                        atr14: Fallback::ATR14,
                        rv20: Fallback::RV20,
                        trend_slope: 0.0,
                        source: ContextSource::Fallback,
                    },
                    ProviderCallMeta {
                        success: false,
                        source: ContextSource::Fallback,
                        error: Some(err.to_string()),
                        duration_ms: duration.as_millis() as u64,
                    },
                )
            }
        };

        let (liquidity_data, liquidity_meta) = match liquidity_result {
            Ok((resp, duration)) => {
                let spread_bps = resp.spread_bps_value().unwrap_or(Fallback::SPREAD_BPS);
                let depth_score = resp.depth_score_value().unwrap_or(Fallback::DEPTH_SCORE);
                let trade_velocity = resp
                    .trade_velocity_value()
                    .unwrap_or_else(|| Fallback::TRADE_VELOCITY.to_string());
                (
                    LiquidityData {
                        spread_bps,
                        depth_score,
                        trade_velocity,
                        source: ContextSource::Api,
                    },
                    ProviderCallMeta {
                        success: true,
                        source: ContextSource::Api,
                        error: None,
                        duration_ms: duration.as_millis() as u64,
                    },
                )
            }
            Err((err, duration)) => {
                warn!(ticker, provider = "liquidity", error = %err, "provider fallback");
                (
                    LiquidityData {
                        spread_bps: Fallback::SPREAD_BPS,
                        depth_score: Fallback::DEPTH_SCORE,
                        trade_velocity: Fallback::TRADE_VELOCITY.to_string(),
                        source: ContextSource::Fallback,
                    },
                    ProviderCallMeta {
                        success: false,
                        source: ContextSource::Fallback,
                        error: Some(err.to_string()),
                        duration_ms: duration.as_millis() as u64,
                    },
                )
            }
        };

        (
            MarketContext {
                options_data,
                market_stats,
                liquidity_data,
            },
            MarketContextMeta {
                options: options_meta,
                stats: stats_meta,
                liquidity: liquidity_meta,
            },
        )
    }

    async fn call_options(
        &self,
        ticker: &str,
    ) -> Result<(crate::providers::OptionsResponse, Duration), (ProviderError, Duration)> {
        match &self.options {
            OptionsSource::Disabled => Err((
                ProviderError {
                    kind: crate::error::ProviderErrorKind::Api,
                    provider: "options".to_string(),
                    retryable: false,
                    message: "provider disabled (no API key)".to_string(),
                },
                Duration::ZERO,
            )),
            OptionsSource::Client(client) => {
                self.with_retry(|| client.fetch(ticker)).await
            }
        }
    }

    async fn call_stats(
        &self,
        ticker: &str,
    ) -> Result<(crate::providers::StatsResponse, Duration), (ProviderError, Duration)> {
        match &self.stats {
            StatsSource::Disabled => Err((
                ProviderError {
                    kind: crate::error::ProviderErrorKind::Api,
                    provider: "stats".to_string(),
                    retryable: false,
                    message: "provider disabled (no API key)".to_string(),
                },
                Duration::ZERO,
            )),
            StatsSource::Client(client) => self.with_retry(|| client.fetch(ticker)).await,
        }
    }

    async fn call_liquidity(
        &self,
        ticker: &str,
    ) -> Result<(crate::providers::LiquidityResponse, Duration), (ProviderError, Duration)> {
        match &self.liquidity {
            LiquiditySource::Disabled => Err((
                ProviderError {
                    kind: crate::error::ProviderErrorKind::Api,
                    provider: "liquidity".to_string(),
                    retryable: false,
                    message: "provider disabled (no API key)".to_string(),
                },
                Duration::ZERO,
            )),
            LiquiditySource::Client(client) => self.with_retry(|| client.fetch(ticker)).await,
        }
    }

    /// Run `make_call` under this builder's per-provider timeout, retrying
    /// up to `max_retries` times with jittered exponential backoff while
    /// staying within the overall timeout budget.
    async fn with_retry<T, F, Fut>(&self, make_call: F) -> Result<(T, Duration), (ProviderError, Duration)>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        let start = Instant::now();
        let mut attempt = 0u32;
        loop {
            match tokio::time::timeout(self.timeout, make_call()).await {
                Ok(Ok(value)) => return Ok((value, start.elapsed())),
                Ok(Err(err)) => {
                    if err.retryable && attempt < self.max_retries {
                        attempt += 1;
                        self.backoff(attempt).await;
                        continue;
                    }
                    return Err((err, start.elapsed()));
                }
                Err(_elapsed) => {
                    if attempt < self.max_retries {
                        attempt += 1;
                        self.backoff(attempt).await;
                        continue;
                    }
                    return Err((ProviderError::timeout("provider"), start.elapsed()));
                }
            }
        }
    }

    async fn backoff(&self, attempt: u32) {
        let base_ms = 25u64 * 2u64.pow(attempt);
        let jitter = self.rng.jitter_fraction(0.3);
        let sleep_ms = (base_ms as f64 * (1.0 + jitter)) as u64;
        tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
    }
}

fn parse_gamma_bias(raw: &str) -> GammaBias {
    match raw.to_uppercase().as_str() {
        "POSITIVE" => GammaBias::Positive,
        "NEGATIVE" => GammaBias::Negative,
        _ => GammaBias::Neutral,
    }
}
