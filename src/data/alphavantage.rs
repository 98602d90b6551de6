//! Alpha Vantage company-overview adapter.
//!
//! API: `https://www.alphavantage.co/query?function=OVERVIEW|INCOME_STATEMENT`
//! Auth: API key via `apikey` query param. Free tier: 25 req/day; a
//! throttled call answers 200 with a `Note` or `Information` body.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

use super::{
    first_float, http_client, normalise_fraction, pct, revenue_cagr, safe_div, to_float,
    AdapterError, AdapterKind, SourceAdapter, SourceHit, SourceResult,
};
use crate::types::MetricsRecord;

const AV_BASE_URL: &str = "https://www.alphavantage.co";

pub struct AlphaVantageAdapter {
    http: Client,
    api_key: Option<SecretString>,
    base_url: String,
}

impl AlphaVantageAdapter {
    pub fn new(api_key: Option<SecretString>, timeout: std::time::Duration) -> Result<Self> {
        Self::with_base_url(api_key, AV_BASE_URL, timeout)
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

    async fn query(&self, function: &str, symbol: &str, key: &str) -> Result<Value, AdapterError> {
        let resp = self
            .http
            .get(format!("{}/query", self.base_url))
            .query(&[("function", function), ("symbol", symbol), ("apikey", key)])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AdapterError::Transport(format!(
                "Alpha Vantage {function} HTTP {}",
                resp.status()
            )));
        }

        let body: Value = resp.json().await?;
        if !body.is_object() {
            return Err(AdapterError::Parse(format!("Alpha Vantage {function}: expected object")));
        }
        if let Some(note) = body.get("Note").or_else(|| body.get("Information")) {
            return Err(AdapterError::Transport(format!(
                "Alpha Vantage throttled: {}",
                note.as_str().unwrap_or("rate limit")
            )));
        }
        Ok(body)
    }

    fn parse_overview(ov: &Value) -> MetricsRecord {
        let roe = first_float(ov, &["ReturnOnEquityTTM"])
            .map(normalise_fraction)
            .or_else(|| {
                let net_income = to_float(ov.get("NetIncomeTTM"));
                let book_value_ps = to_float(ov.get("BookValue"));
                let shares = to_float(ov.get("SharesOutstanding"));
                let equity = match (book_value_ps, shares) {
                    (Some(b), Some(s)) => Some(b * s),
                    _ => None,
                };
                safe_div(net_income, equity)
            });

        MetricsRecord {
            pe: to_float(ov.get("PERatio")),
            roe_pct: pct(roe),
            ..Default::default()
        }
    }

    fn parse_income(js: &Value) -> Option<f64> {
        let reports = js.get("annualReports")?.as_array()?;
        let revenues: Vec<Option<f64>> = reports
            .iter()
            .take(5)
            .map(|r| to_float(r.get("totalRevenue")))
            .collect();
        pct(revenue_cagr(&revenues))
    }
}

#[async_trait]
impl SourceAdapter for AlphaVantageAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Overview
    }

    fn name(&self) -> &'static str {
        "alphavantage"
    }

    async fn fetch(&self, symbol: &str) -> SourceResult {
        let key = self
            .api_key
            .as_ref()
            .ok_or_else(|| AdapterError::Unavailable("Alpha Vantage API key not configured".into()))?;
        let key = key.expose_secret().as_str();

        let overview = self.query("OVERVIEW", symbol, key).await;
        let income = self.query("INCOME_STATEMENT", symbol, key).await;

        let mut metrics = match &overview {
            Ok(ov) => Self::parse_overview(ov),
            Err(e) => {
                debug!(symbol, error = %e, "Alpha Vantage overview failed");
                MetricsRecord::default()
            }
        };
        match &income {
            Ok(js) => metrics.revenue_cagr_pct = Self::parse_income(js),
            Err(e) => debug!(symbol, error = %e, "Alpha Vantage income statement failed"),
        }

        // Both calls failed: report the overview's error, it is the primary one.
        if let (Err(e), Err(_)) = (overview, income) {
            return Err(e);
        }

        debug!(symbol, metrics = %metrics, "Alpha Vantage parsed");
        SourceHit::from_metrics(AdapterKind::Overview, metrics)
    }
}
