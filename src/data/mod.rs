//! External data sources.
//!
//! Defines the `SourceAdapter` trait for fundamentals providers and the
//! helpers they share. Each adapter covers one upstream service and turns
//! its payload into a partial [`MetricsRecord`]; news feeds live in
//! [`news`].

pub mod alphavantage;
pub mod finnhub;
pub mod fmp;
pub mod news;
pub mod nse;
pub mod yahoo;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::types::MetricsRecord;

/// Default per-request HTTP timeout for adapters.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(12);

const USER_AGENT: &str = "IPOBot/0.1.0";

// ---------------------------------------------------------------------------
// Adapter identity
// ---------------------------------------------------------------------------

/// Closed set of fundamentals providers. The declaration order is the
/// merge priority: earlier variants win field conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AdapterKind {
    /// Exchange quote endpoint (NSE). Fast, P/E only.
    ExchangeQuote,
    /// Broad-coverage metrics (Finnhub).
    Metrics,
    /// Annual statements (Financial Modeling Prep).
    Statements,
    /// Company overview (Alpha Vantage).
    Overview,
    /// Derived from price history and reported financials (Yahoo).
    PriceHistory,
}

impl AdapterKind {
    pub const ALL: &'static [AdapterKind] = &[
        AdapterKind::ExchangeQuote,
        AdapterKind::Metrics,
        AdapterKind::Statements,
        AdapterKind::Overview,
        AdapterKind::PriceHistory,
    ];

    /// Lower = consulted first and wins merges.
    pub fn priority(&self) -> u8 {
        match self {
            AdapterKind::ExchangeQuote => 0,
            AdapterKind::Metrics => 1,
            AdapterKind::Statements => 2,
            AdapterKind::Overview => 3,
            AdapterKind::PriceHistory => 4,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Why an adapter produced nothing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdapterError {
    /// Missing credential or configuration. Nothing was sent.
    #[error("unavailable: {0}")]
    Unavailable(String),
    /// Network failure, timeout or non-2xx status.
    #[error("transport error: {0}")]
    Transport(String),
    /// Payload did not have the expected shape.
    #[error("parse error: {0}")]
    Parse(String),
    /// Well-formed payload without a single usable field.
    #[error("no usable fields in response")]
    Empty,
}

impl From<reqwest::Error> for AdapterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AdapterError::Parse(e.to_string())
        } else {
            AdapterError::Transport(e.to_string())
        }
    }
}

/// A successful adapter call: partial metrics plus provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceHit {
    pub source: AdapterKind,
    pub metrics: MetricsRecord,
}

/// Output of one adapter invocation.
pub type SourceResult = std::result::Result<SourceHit, AdapterError>;

impl SourceHit {
    /// Wrap a record, turning an all-empty record into [`AdapterError::Empty`].
    pub fn from_metrics(source: AdapterKind, metrics: MetricsRecord) -> SourceResult {
        if metrics.is_empty() {
            Err(AdapterError::Empty)
        } else {
            Ok(SourceHit { source, metrics })
        }
    }
}

// ---------------------------------------------------------------------------
// Adapter trait
// ---------------------------------------------------------------------------

/// Abstraction over fundamentals providers.
///
/// Implementations must not block indefinitely; the resolver applies its
/// own deadline on top of the HTTP client's timeout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which provider this is. Determines merge priority.
    fn kind(&self) -> AdapterKind;

    /// Short identifier used in logs and warnings.
    fn name(&self) -> &'static str;

    /// Whether this adapter can say anything about `symbol` at all.
    /// Unsupported symbols are skipped without counting as a failure.
    fn supports(&self, _symbol: &str) -> bool {
        true
    }

    /// Fetch whatever metrics the provider has for `symbol`.
    async fn fetch(&self, symbol: &str) -> SourceResult;
}

impl fmt::Debug for dyn SourceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceAdapter({})", self.name())
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Build the HTTP client adapters share.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build adapter HTTP client")
}

/// Coerce a JSON scalar into a float. Accepts numbers and numeric strings
/// with thousands separators; anything else (including "None") is `None`.
pub fn to_float(v: Option<&Value>) -> Option<f64> {
    let parsed = match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// First key of `keys` that yields a number.
pub fn first_float(obj: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| to_float(obj.get(*k)))
}

/// `a / b`, or `None` when either side is missing or `b` is zero.
pub fn safe_div(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) if b != 0.0 => Some(a / b),
        _ => None,
    }
}

pub fn pct(fraction: Option<f64>) -> Option<f64> {
    fraction.map(|x| x * 100.0)
}

/// Providers mix fractions (0.18) and percentages (18.0) for the same
/// metric. Values above 2 are read as percentages.
pub fn normalise_fraction(x: f64) -> f64 {
    if x > 2.0 {
        x / 100.0
    } else {
        x
    }
}

/// Compound annual growth over a newest-first series.
///
/// Needs at least three values, uses at most five. Returns a fraction, or
/// `None` when the oldest value used is not positive.
pub fn revenue_cagr(newest_first: &[Option<f64>]) -> Option<f64> {
    const MIN_YEARS: usize = 3;
    const MAX_YEARS: usize = 5;

    let vals: Vec<f64> = newest_first.iter().flatten().copied().collect();
    if vals.len() < MIN_YEARS {
        return None;
    }
    let n = vals.len().min(MAX_YEARS);
    let (end, start) = (vals[0], vals[n - 1]);
    if start <= 0.0 {
        return None;
    }
    let growth = (end / start).powf(1.0 / (n - 1) as f64) - 1.0;
    growth.is_finite().then_some(growth)
}

/// Split an NSE-qualified ticker: `RELIANCE.NS` -> `Some("RELIANCE")`.
pub fn nse_base(symbol: &str) -> Option<&str> {
    symbol.strip_suffix(".NS").filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
