use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// One fully-populated OHLCV bar. Bars with any missing field never make it
/// out of normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Ordered bars for one ticker over one (range, interval) window.
/// Invariant after normalization: strictly increasing timestamps.
pub type PriceSeries = Vec<PriceBar>;

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("market data request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("market data source returned HTTP {0}")]
    Status(StatusCode),
}

/// Price-history source. The screener only ever needs two call shapes: a
/// short fine-grained window for triggering and a longer one for charting.
/// An unknown ticker is an empty series, not an error; only transport-level
/// failures surface as `Err`.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn fetch(
        &self,
        ticker: &str,
        range: &str,
        interval: &str,
    ) -> Result<PriceSeries, MarketDataError>;
}

// --- Yahoo Finance v8 chart API ---

// The chart endpoint nests each OHLCV column in its own array under
// indicators.quote[0], with nulls for bars the venue never printed.
// Everything below exists to flatten that into PriceBars.

#[derive(Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Deserialize)]
struct ChartEnvelope {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<Option<i64>>,
    indicators: Indicators,
}

#[derive(Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
}

#[derive(Deserialize, Default)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

pub struct YahooMarketData {
    client: reqwest::Client,
    base_url: String,
}

impl YahooMarketData {
    pub fn new() -> Self {
        Self::with_base_url("https://query1.finance.yahoo.com")
    }

    /// Base URL override, used by tests to point at a local mock server.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            // Yahoo rejects the default reqwest agent string.
            .user_agent("Mozilla/5.0 (compatible; rsi-screener/0.1)")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl Default for YahooMarketData {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketData for YahooMarketData {
    async fn fetch(
        &self,
        ticker: &str,
        range: &str,
        interval: &str,
    ) -> Result<PriceSeries, MarketDataError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("range", range),
                ("interval", interval),
                ("includePrePost", "false"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            // Unknown symbols come back as 404 with an in-band error blob.
            debug!(ticker, "no chart data for symbol");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(MarketDataError::Status(status));
        }

        let payload: ChartResponse = response.json().await?;
        Ok(normalize(payload))
    }
}

/// Flattens the column-oriented chart payload into ordered PriceBars.
/// Rows with any missing field are dropped whole; duplicate timestamps keep
/// the first occurrence.
fn normalize(payload: ChartResponse) -> PriceSeries {
    let Some(result) = payload.chart.result.and_then(|mut r| {
        if r.is_empty() { None } else { Some(r.remove(0)) }
    }) else {
        return Vec::new();
    };

    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Vec::new();
    };

    let mut bars: PriceSeries = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            Some(PriceBar {
                timestamp: (*ts)?,
                open: *quote.open.get(i)?.as_ref()?,
                high: *quote.high.get(i)?.as_ref()?,
                low: *quote.low.get(i)?.as_ref()?,
                close: *quote.close.get(i)?.as_ref()?,
                volume: *quote.volume.get(i)?.as_ref()?,
            })
        })
        .collect();

    bars.sort_by_key(|bar| bar.timestamp);
    bars.dedup_by_key(|bar| bar.timestamp);
    bars
}
