//! Yahoo Finance price-history adapter.
//!
//! Last resort of the chain and the only one needing no credential. Takes
//! the last close from the chart API and annual figures from the
//! fundamentals-timeseries API, then derives every ratio locally:
//!
//! - P/E = price / (net income / shares)
//! - ROE = net income / equity
//! - D/E = total debt / equity
//! - revenue CAGR over up to five annual revenues

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use super::{
    http_client, pct, revenue_cagr, safe_div, to_float, AdapterError, AdapterKind, SourceAdapter,
    SourceHit, SourceResult,
};
use crate::types::MetricsRecord;

const YAHOO_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Start of the timeseries window (1985-08-22), far enough back for any
/// listing.
const TIMESERIES_PERIOD_START: i64 = 493_590_046;

const SERIES: &[&str] = &[
    "annualNetIncome",
    "annualTotalRevenue",
    "annualStockholdersEquity",
    "annualTotalDebt",
    "annualOrdinarySharesNumber",
];

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    indicators: Option<ChartIndicators>,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default, rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct TimeseriesResponse {
    timeseries: TimeseriesBody,
}

#[derive(Debug, Deserialize)]
struct TimeseriesBody {
    #[serde(default)]
    result: Vec<Value>,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Annual series keyed by type name, each newest first.
type AnnualSeries = HashMap<String, Vec<Option<f64>>>;

pub struct YahooAdapter {
    http: Client,
    base_url: String,
}

impl YahooAdapter {
    pub fn new(timeout: std::time::Duration) -> Result<Self> {
        Self::with_base_url(YAHOO_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: std::time::Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn last_price(&self, symbol: &str) -> Result<Option<f64>, AdapterError> {
        let resp = self
            .http
            .get(format!("{}/v8/finance/chart/{}", self.base_url, urlencoding::encode(symbol)))
            .query(&[("range", "6mo"), ("interval", "1d")])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AdapterError::Transport(format!("Yahoo chart HTTP {}", resp.status())));
        }
        let body: ChartResponse = resp.json().await?;
        Ok(Self::parse_last_price(body))
    }

    /// Latest non-null close, else the quoted market price.
    fn parse_last_price(body: ChartResponse) -> Option<f64> {
        let result = body.chart.result?.into_iter().next()?;
        let close = result
            .indicators
            .and_then(|i| i.quote.into_iter().next())
            .and_then(|q| q.close.into_iter().rev().flatten().next());
        close.or_else(|| result.meta.and_then(|m| m.regular_market_price))
    }

    async fn annual_series(&self, symbol: &str) -> Result<AnnualSeries, AdapterError> {
        let period2 = Utc::now().timestamp().to_string();
        let period1 = TIMESERIES_PERIOD_START.to_string();
        let types = SERIES.join(",");
        let resp = self
            .http
            .get(format!(
                "{}/ws/fundamentals-timeseries/v1/finance/timeseries/{}",
                self.base_url,
                urlencoding::encode(symbol)
            ))
            .query(&[
                ("type", types.as_str()),
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AdapterError::Transport(format!(
                "Yahoo timeseries HTTP {}",
                resp.status()
            )));
        }
        let body: TimeseriesResponse = resp.json().await?;
        Ok(Self::parse_series(&body.timeseries.result))
    }

    /// Each result entry names its type in `meta.type[0]` and carries the
    /// data points under the same key. Points are sorted newest first by
    /// `asOfDate`; null points are dropped.
    fn parse_series(results: &[Value]) -> AnnualSeries {
        let mut out = AnnualSeries::new();
        for entry in results {
            let Some(name) = entry
                .pointer("/meta/type/0")
                .and_then(Value::as_str)
            else {
                continue;
            };
            let Some(points) = entry.get(name).and_then(Value::as_array) else {
                continue;
            };

            let mut dated: Vec<(Option<NaiveDate>, Option<f64>)> = points
                .iter()
                .filter(|p| !p.is_null())
                .map(|p| {
                    let date = p
                        .get("asOfDate")
                        .and_then(Value::as_str)
                        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
                    let value = to_float(p.pointer("/reportedValue/raw"));
                    (date, value)
                })
                .collect();
            dated.sort_by(|a, b| b.0.cmp(&a.0));
            out.insert(name.to_string(), dated.into_iter().map(|(_, v)| v).collect());
        }
        out
    }

    fn derive(price: Option<f64>, series: &AnnualSeries) -> MetricsRecord {
        let latest = |name: &str| {
            series
                .get(name)
                .and_then(|s| s.iter().flatten().next().copied())
        };

        let net_income = latest("annualNetIncome");
        let equity = latest("annualStockholdersEquity");
        let debt = latest("annualTotalDebt");
        let shares = latest("annualOrdinarySharesNumber");

        let eps = safe_div(net_income, shares);
        let pe = safe_div(price, eps);

        let revenue_cagr_pct = series
            .get("annualTotalRevenue")
            .and_then(|revs| pct(revenue_cagr(&revs[..revs.len().min(5)])));

        MetricsRecord {
            pe,
            roe_pct: pct(safe_div(net_income, equity)),
            debt_to_equity: safe_div(debt, equity),
            revenue_cagr_pct,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SourceAdapter for YahooAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::PriceHistory
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch(&self, symbol: &str) -> SourceResult {
        let price = match self.last_price(symbol).await {
            Ok(p) => p,
            Err(e) => {
                debug!(symbol, error = %e, "Yahoo price unavailable, ratios only");
                None
            }
        };
        let series = self.annual_series(symbol).await?;
        let metrics = Self::derive(price, &series);
        debug!(symbol, price = ?price, metrics = %metrics, "Yahoo financials derived");
        SourceHit::from_metrics(AdapterKind::PriceHistory, metrics)
    }
}
