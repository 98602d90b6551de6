//! Finnhub basic-financials adapter.
//!
//! Broad coverage (US and NSE listings) from a single endpoint:
//! `GET /api/v1/stock/metric?symbol=..&metric=all&token=..`.
//! For `.NS` symbols the exchange-qualified form `NSE:<base>` is tried
//! before the raw ticker.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{
    first_float, http_client, normalise_fraction, nse_base, pct, AdapterError, AdapterKind,
    SourceAdapter, SourceHit, SourceResult,
};
use crate::types::MetricsRecord;

const FINNHUB_BASE_URL: &str = "https://finnhub.io";

#[derive(Debug, Deserialize)]
struct MetricResponse {
    #[serde(default)]
    metric: Option<Value>,
}

pub struct FinnhubAdapter {
    http: Client,
    api_key: Option<SecretString>,
    base_url: String,
}

impl FinnhubAdapter {
    pub fn new(api_key: Option<SecretString>, timeout: std::time::Duration) -> Result<Self> {
        Self::with_base_url(api_key, FINNHUB_BASE_URL, timeout)
    }

    pub fn with_base_url(
        api_key: Option<SecretString>,
        base_url: &str,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Symbol spellings to try, most specific first.
    fn candidates(symbol: &str) -> Vec<String> {
        match nse_base(symbol) {
            Some(base) => vec![format!("NSE:{base}"), symbol.to_string()],
            None => vec![symbol.to_string()],
        }
    }

    /// Map Finnhub's metric object onto the record.
    fn parse_metrics(m: &Value) -> MetricsRecord {
        let pe = first_float(m, &["peTTM", "peExclExtraTTM"]).or_else(|| {
            first_float(m, &["earningsYieldTTM"])
                .filter(|ey| *ey != 0.0)
                .map(|ey| 1.0 / ey)
        });

        let roe = first_float(m, &["roeTTM", "returnOnEquityTTM"]).map(normalise_fraction);

        let debt_to_equity = first_float(
            m,
            &["debtToEquityAnnual", "debtToEquityTTM", "totalDebt/totalEquityAnnual"],
        );

        let growth = first_float(m, &["revenueCagr3Y", "revenueCagr5Y", "salesCAGR5Y"])
            .map(normalise_fraction);

        MetricsRecord {
            pe,
            roe_pct: pct(roe),
            debt_to_equity,
            revenue_cagr_pct: pct(growth),
            ..Default::default()
        }
    }

    async fn fetch_one(&self, symbol: &str, key: &str) -> SourceResult {
        let resp = self
            .http
            .get(format!("{}/api/v1/stock/metric", self.base_url))
            .query(&[("symbol", symbol), ("metric", "all"), ("token", key)])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AdapterError::Transport(format!("Finnhub HTTP {}", resp.status())));
        }

        let body: MetricResponse = resp.json().await?;
        let metric = body
            .metric
            .filter(Value::is_object)
            .ok_or_else(|| AdapterError::Parse("missing metric object".into()))?;
        SourceHit::from_metrics(AdapterKind::Metrics, Self::parse_metrics(&metric))
    }
}

#[async_trait]
impl SourceAdapter for FinnhubAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Metrics
    }

    fn name(&self) -> &'static str {
        "finnhub"
    }

    async fn fetch(&self, symbol: &str) -> SourceResult {
        let key = self
            .api_key
            .as_ref()
            .ok_or_else(|| AdapterError::Unavailable("Finnhub API key not configured".into()))?;

        let mut last_err = AdapterError::Empty;
        for candidate in Self::candidates(symbol) {
            match self.fetch_one(&candidate, key.expose_secret()).await {
                Ok(hit) => {
                    debug!(symbol = %candidate, metrics = %hit.metrics, "Finnhub metrics parsed");
                    return Ok(hit);
                }
                Err(e) => {
                    debug!(symbol = %candidate, error = %e, "Finnhub candidate failed");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}
