//! NSE exchange-quote adapter.
//!
//! Reads the trailing P/E straight from the exchange's quote endpoint for
//! `.NS` symbols. Narrow (one field) but fast and authoritative, so it
//! sits first in the chain.
//!
//! The endpoint refuses requests without session cookies, so each fetch
//! primes the cookie jar with a request to the site root first.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{nse_base, to_float, AdapterError, AdapterKind, SourceAdapter, SourceHit, SourceResult};
use crate::types::MetricsRecord;

const NSE_BASE_URL: &str = "https://www.nseindia.com";

/// Browser-like agent; the exchange rejects obvious bots.
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

pub struct NseAdapter {
    http: Client,
    base_url: String,
}

impl NseAdapter {
    pub fn new(timeout: std::time::Duration) -> Result<Self> {
        Self::with_base_url(NSE_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: std::time::Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_UA)
            .cookie_store(true)
            .build()
            .context("Failed to build NSE HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn headers(base: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        let referer = format!("https://www.nseindia.com/get-quotes/equity?symbol={base}");
        if let Ok(v) = HeaderValue::from_str(&referer) {
            headers.insert(REFERER, v);
        }
        headers
    }

    /// Pull `priceInfo.pE` out of a quote payload.
    fn parse_quote(body: &Value) -> Result<MetricsRecord, AdapterError> {
        let price_info = body
            .get("priceInfo")
            .ok_or_else(|| AdapterError::Parse("missing priceInfo".into()))?;
        Ok(MetricsRecord {
            pe: to_float(price_info.get("pE")),
            ..Default::default()
        })
    }
}

#[async_trait]
impl SourceAdapter for NseAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::ExchangeQuote
    }

    fn name(&self) -> &'static str {
        "nse"
    }

    fn supports(&self, symbol: &str) -> bool {
        nse_base(symbol).is_some()
    }

    async fn fetch(&self, symbol: &str) -> SourceResult {
        let base = nse_base(symbol)
            .ok_or_else(|| AdapterError::Unavailable(format!("{symbol} is not an NSE symbol")))?;

        // Cookie priming; a failure here surfaces on the real request.
        if let Err(e) = self.http.get(&self.base_url).send().await {
            debug!(error = %e, "NSE cookie priming failed");
        }

        let resp = self
            .http
            .get(format!("{}/api/quote-equity", self.base_url))
            .headers(Self::headers(base))
            .query(&[("symbol", base)])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AdapterError::Transport(format!("NSE HTTP {}", resp.status())));
        }

        let body: Value = resp.json().await?;
        let metrics = Self::parse_quote(&body)?;
        debug!(symbol, pe = ?metrics.pe, "NSE quote parsed");
        SourceHit::from_metrics(AdapterKind::ExchangeQuote, metrics)
    }
}
