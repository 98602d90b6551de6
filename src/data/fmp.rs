//! Financial Modeling Prep statements adapter.
//!
//! Derives ratios from raw annual statements rather than trusting a
//! pre-computed metric: ROE and D/E from the latest income statement and
//! balance sheet, revenue CAGR from up to five years of revenue. P/E comes
//! from the company profile.
//!
//! API: `https://financialmodelingprep.com/api/v3`
//! Auth: API key via `apikey` query param.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

use super::{
    http_client, pct, revenue_cagr, safe_div, to_float, AdapterError, AdapterKind,
    SourceAdapter, SourceHit, SourceResult,
};
use crate::types::MetricsRecord;

const FMP_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";

pub struct FmpAdapter {
    http: Client,
    api_key: Option<SecretString>,
    base_url: String,
}

impl FmpAdapter {
    pub fn new(api_key: Option<SecretString>, timeout: std::time::Duration) -> Result<Self> {
        Self::with_base_url(api_key, FMP_BASE_URL, timeout)
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

    async fn get_list(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Vec<Value>, AdapterError> {
        let resp = self
            .http
            .get(format!("{}/{endpoint}", self.base_url))
            .query(params)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AdapterError::Transport(format!("FMP {endpoint} HTTP {}", resp.status())));
        }

        match resp.json::<Value>().await? {
            Value::Array(rows) => Ok(rows),
            other => Err(AdapterError::Parse(format!(
                "FMP {endpoint}: expected array, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Order statement rows newest first by their `date` field. Rows with
    /// unparseable dates keep their relative order at the end.
    fn newest_first(mut rows: Vec<Value>) -> Vec<Value> {
        let date = |row: &Value| {
            row.get("date")
                .and_then(Value::as_str)
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        };
        rows.sort_by(|a, b| date(b).cmp(&date(a)));
        rows
    }

    /// Combine profile, income statements and balance sheets.
    fn derive(profile: Option<&Value>, income: &[Value], balance: &[Value]) -> MetricsRecord {
        let mut out = MetricsRecord {
            pe: profile.and_then(|p| to_float(p.get("pe"))),
            ..Default::default()
        };

        let Some(latest_income) = income.first() else {
            return out;
        };

        if let Some(latest_balance) = balance.first() {
            let net_income = to_float(latest_income.get("netIncome"));
            let equity = to_float(latest_balance.get("totalStockholdersEquity"));
            let debt = to_float(latest_balance.get("totalDebt"));
            out.roe_pct = pct(safe_div(net_income, equity));
            out.debt_to_equity = safe_div(debt, equity);
        }

        let revenues: Vec<Option<f64>> = income
            .iter()
            .take(5)
            .map(|row| to_float(row.get("revenue")))
            .collect();
        out.revenue_cagr_pct = pct(revenue_cagr(&revenues));
        out
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl SourceAdapter for FmpAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Statements
    }

    fn name(&self) -> &'static str {
        "fmp"
    }

    async fn fetch(&self, symbol: &str) -> SourceResult {
        let key = self
            .api_key
            .as_ref()
            .ok_or_else(|| AdapterError::Unavailable("FMP API key not configured".into()))?;
        let key = key.expose_secret().as_str();

        // Profile is optional: statements alone still yield ROE, D/E, growth.
        let profile = match self.get_list(&format!("profile/{symbol}"), &[("apikey", key)]).await {
            Ok(rows) => rows.into_iter().next(),
            Err(e) => {
                debug!(symbol, error = %e, "FMP profile unavailable");
                None
            }
        };

        let statement_params = [("period", "annual"), ("limit", "5"), ("apikey", key)];
        let income = self
            .get_list(&format!("income-statement/{symbol}"), &statement_params)
            .await;
        let balance = self
            .get_list(&format!("balance-sheet-statement/{symbol}"), &statement_params)
            .await
            .unwrap_or_default();

        let income = match income {
            Ok(rows) => Self::newest_first(rows),
            // Without statements only the profile P/E is left.
            Err(e) if profile.is_none() => return Err(e),
            Err(e) => {
                debug!(symbol, error = %e, "FMP income statement unavailable");
                Vec::new()
            }
        };
        let balance = Self::newest_first(balance);

        let metrics = Self::derive(profile.as_ref(), &income, &balance);
        debug!(symbol, metrics = %metrics, "FMP statements parsed");
        SourceHit::from_metrics(AdapterKind::Statements, metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn income_rows() -> Vec<Value> {
        vec![
            json!({"date": "2021-03-31", "revenue": 100.0, "netIncome": 5.0}),
            json!({"date": "2023-03-31", "revenue": 144.0, "netIncome": 22.0}),
            json!({"date": "2022-03-31", "revenue": 120.0, "netIncome": 10.0}),
        ]
    }

    #[test]
    fn test_newest_first_sorts_by_date() {
        let rows = FmpAdapter::newest_first(income_rows());
        let dates: Vec<&str> = rows.iter().map(|r| r["date"].as_str().unwrap()).collect();
        assert_eq!(dates, vec!["2023-03-31", "2022-03-31", "2021-03-31"]);
    }

    #[test]
    fn test_derive_ratios() {
        let income = FmpAdapter::newest_first(income_rows());
        let balance = vec![json!({"totalStockholdersEquity": 100.0, "totalDebt": 80.0})];
        let profile = json!({"pe": 31.5});

        let m = FmpAdapter::derive(Some(&profile), &income, &balance);
        assert_eq!(m.pe, Some(31.5));
        assert!((m.roe_pct.unwrap() - 22.0).abs() < 1e-9);
        assert!((m.debt_to_equity.unwrap() - 0.8).abs() < 1e-9);
        // 100 -> 144 over two years = 20% a year
        assert!((m.revenue_cagr_pct.unwrap() - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_derive_without_balance_sheet() {
        let income = FmpAdapter::newest_first(income_rows());
        let m = FmpAdapter::derive(None, &income, &[]);
        assert_eq!(m.roe_pct, None);
        assert_eq!(m.debt_to_equity, None);
        assert!(m.revenue_cagr_pct.is_some());
    }

    #[tokio::test]
    async fn test_fetch_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/profile/INFY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"pe": 24.0}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/income-statement/INFY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(income_rows())))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/balance-sheet-statement/INFY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"date": "2023-03-31", "totalStockholdersEquity": 110.0, "totalDebt": 11.0}
            ])))
            .mount(&server)
            .await;

        let a = FmpAdapter::with_base_url(
            Some(SecretString::new("k".into())),
            &server.uri(),
            Duration::from_secs(5),
        )
        .unwrap();
        let hit = a.fetch("INFY").await.unwrap();
        assert_eq!(hit.metrics.pe, Some(24.0));
        assert!((hit.metrics.roe_pct.unwrap() - 20.0).abs() < 1e-9);
        assert!((hit.metrics.debt_to_equity.unwrap() - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_error_object_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"Error Message": "Invalid API KEY"})),
            )
            .mount(&server)
            .await;

        let a = FmpAdapter::with_base_url(
            Some(SecretString::new("bad".into())),
            &server.uri(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(matches!(a.fetch("INFY").await, Err(AdapterError::Parse(_))));
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let a = FmpAdapter::new(None, Duration::from_secs(1)).unwrap();
        assert!(matches!(a.fetch("INFY").await, Err(AdapterError::Unavailable(_))));
    }
}
