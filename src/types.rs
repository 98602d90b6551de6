//! Shared types for IPOBot.
//!
//! These types form the data model used across all modules. Every value
//! here is built fresh for a single pipeline invocation; nothing in this
//! module holds state between runs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Normalised fundamentals for one instrument.
///
/// All six fields are independently optional: a provider that only knows
/// the P/E ratio returns a record with just `pe` set. Percentages are
/// stored as percentages (22.0 means 22%), ratios as plain ratios.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub pe: Option<f64>,
    pub peer_pe: Option<f64>,
    pub roe_pct: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub revenue_cagr_pct: Option<f64>,
    /// Positive = trades at a discount to peers, negative = premium.
    pub peer_gap_pct: Option<f64>,
}

impl MetricsRecord {
    /// Fill every still-empty field from `other`. Fields that already hold
    /// a value are never touched. Returns the number of fields filled.
    pub fn fill_missing(&mut self, other: &MetricsRecord) -> usize {
        fn take(slot: &mut Option<f64>, incoming: Option<f64>) -> usize {
            match (slot.is_none(), incoming) {
                (true, Some(v)) => {
                    *slot = Some(v);
                    1
                }
                _ => 0,
            }
        }

        take(&mut self.pe, other.pe)
            + take(&mut self.peer_pe, other.peer_pe)
            + take(&mut self.roe_pct, other.roe_pct)
            + take(&mut self.debt_to_equity, other.debt_to_equity)
            + take(&mut self.revenue_cagr_pct, other.revenue_cagr_pct)
            + take(&mut self.peer_gap_pct, other.peer_gap_pct)
    }

    /// Whether every field a data provider can supply is present.
    ///
    /// Peer P/E comes from the caller and the peer gap is derived after
    /// the provider chain, so neither participates here.
    pub fn is_core_complete(&self) -> bool {
        self.pe.is_some()
            && self.roe_pct.is_some()
            && self.debt_to_equity.is_some()
            && self.revenue_cagr_pct.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == MetricsRecord::default()
    }

    fn values(&self) -> [Option<f64>; 6] {
        [
            self.pe,
            self.peer_pe,
            self.roe_pct,
            self.debt_to_equity,
            self.revenue_cagr_pct,
            self.peer_gap_pct,
        ]
    }

    /// True if any present field is NaN or infinite.
    pub fn has_non_finite(&self) -> bool {
        self.values().iter().flatten().any(|v| !v.is_finite())
    }

    /// Derive the peer valuation gap from `pe` and `peer_pe`.
    ///
    /// `1 - pe / peer_pe`, expressed as a percentage. Leaves the field
    /// empty when either input is missing or the peer P/E is zero.
    pub fn derive_peer_gap(&mut self) {
        if let (Some(pe), Some(peer)) = (self.pe, self.peer_pe) {
            if peer != 0.0 {
                self.peer_gap_pct = Some((1.0 - pe / peer) * 100.0);
            }
        }
    }
}

impl fmt::Display for MetricsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<f64>| match v {
            Some(v) => format!("{v:.2}"),
            None => "-".to_string(),
        };
        write!(
            f,
            "P/E {} | peer P/E {} | ROE {}% | D/E {} | rev CAGR {}% | peer gap {}%",
            show(self.pe),
            show(self.peer_pe),
            show(self.roe_pct),
            show(self.debt_to_equity),
            show(self.revenue_cagr_pct),
            show(self.peer_gap_pct),
        )
    }
}

/// Boolean quality checks derived from a [`MetricsRecord`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    /// Return on equity at or above 15%.
    pub roe_ok: bool,
    /// Debt-to-equity at or below 1.0.
    pub leverage_ok: bool,
    /// Revenue CAGR at or above 20%.
    pub growth_ok: bool,
}

// ---------------------------------------------------------------------------
// News
// ---------------------------------------------------------------------------

/// Headline tone, assigned when the headline is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// +1 / 0 / -1.
    pub fn polarity(&self) -> f64 {
        match self {
            SentimentLabel::Positive => 1.0,
            SentimentLabel::Neutral => 0.0,
            SentimentLabel::Negative => -1.0,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentLabel::Positive => write!(f, "positive"),
            SentimentLabel::Neutral => write!(f, "neutral"),
            SentimentLabel::Negative => write!(f, "negative"),
        }
    }
}

/// A single headline with its tone label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    #[serde(rename = "sent")]
    pub sentiment: SentimentLabel,
}

impl NewsItem {
    pub fn new(title: impl Into<String>, sentiment: SentimentLabel) -> Self {
        Self {
            title: title.into(),
            sentiment,
        }
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Final call. Variant order matters: `Avoid < Hold < Buy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Avoid,
    Hold,
    Buy,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Avoid => write!(f, "AVOID"),
            Decision::Hold => write!(f, "HOLD"),
            Decision::Buy => write!(f, "BUY"),
        }
    }
}

/// Probability cut points. `hold_prob <= buy_prob` is required.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub buy_prob: f64,
    pub hold_prob: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            buy_prob: 0.62,
            hold_prob: 0.45,
        }
    }
}

impl Thresholds {
    /// Check range and ordering.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let in_range = |p: f64| p.is_finite() && (0.0..=1.0).contains(&p);
        if !in_range(self.buy_prob) || !in_range(self.hold_prob) {
            return Err(PipelineError::InvalidConfiguration(format!(
                "thresholds must lie in [0, 1] (buy_prob={}, hold_prob={})",
                self.buy_prob, self.hold_prob
            )));
        }
        if self.hold_prob > self.buy_prob {
            return Err(PipelineError::InvalidConfiguration(format!(
                "hold_prob ({}) must not exceed buy_prob ({})",
                self.hold_prob, self.buy_prob
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pipeline input / output
// ---------------------------------------------------------------------------

/// Optional per-run override of the configured thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOverride {
    pub buy_prob: Option<f64>,
    pub hold_prob: Option<f64>,
}

/// One analysis request.
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    /// Ticker (`TSLA`, `RELIANCE.NS`, `NSE:ZOMATO`) or a company name.
    pub symbol_or_name: String,
    /// Free-text news query.
    pub query: String,
    pub thresholds: Option<ThresholdOverride>,
    /// Skip name resolution and use `symbol_or_name` verbatim.
    pub symbol_is_final: bool,
    /// Peer P/E for the valuation-gap comparison. Not populated by the
    /// default wiring.
    pub peer_pe: Option<f64>,
}

impl PipelineRequest {
    pub fn new(symbol_or_name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            symbol_or_name: symbol_or_name.into(),
            query: query.into(),
            ..Default::default()
        }
    }
}

/// Presentation view of the fundamentals, rounded to two decimals and
/// keyed with the labels front-ends display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsView {
    #[serde(rename = "P/E")]
    pub pe: Option<Decimal>,
    #[serde(rename = "Peer P/E")]
    pub peer_pe: Option<Decimal>,
    #[serde(rename = "ROE (%)")]
    pub roe_pct: Option<Decimal>,
    #[serde(rename = "D/E")]
    pub debt_to_equity: Option<Decimal>,
    #[serde(rename = "Revenue CAGR (%)")]
    pub revenue_cagr_pct: Option<Decimal>,
    #[serde(rename = "P/E discount vs peer (%)")]
    pub peer_gap_pct: Option<Decimal>,
}

impl From<&MetricsRecord> for FundamentalsView {
    fn from(m: &MetricsRecord) -> Self {
        let round = |v: Option<f64>| {
            v.and_then(Decimal::from_f64_retain)
                .map(|d| d.round_dp(2).normalize())
        };
        Self {
            pe: round(m.pe),
            peer_pe: round(m.peer_pe),
            roe_pct: round(m.roe_pct),
            debt_to_equity: round(m.debt_to_equity),
            revenue_cagr_pct: round(m.revenue_cagr_pct),
            peer_gap_pct: round(m.peer_gap_pct),
        }
    }
}

/// Which switches and collaborators shaped a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMeta {
    pub use_live_news: bool,
    pub use_live_sentiment: bool,
    pub news_provider: String,
    pub sentiment_strategy: String,
    pub model: String,
    /// Adapters that contributed at least one field, in priority order.
    pub providers_used: Vec<String>,
    pub fundamentals_score: f64,
    pub flags: Flags,
}

/// Complete output of one pipeline run. Always fully populated; the
/// `warnings` and `errors` lists disclose any degradation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub symbol: String,
    pub query: String,
    pub sentiment: f64,
    pub fundamentals: FundamentalsView,
    pub probability: f64,
    pub expected_gain_pct: f64,
    pub decision: Decision,
    pub reasoning: String,
    pub news_sample: Vec<NewsItem>,
    pub meta: PipelineMeta,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl fmt::Display for PipelineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (p={:.2}, gain≈{:.1}%, sentiment={:+.2}, {} warnings, {} errors)",
            self.decision,
            self.symbol,
            self.probability,
            self.expected_gain_pct,
            self.sentiment,
            self.warnings.len(),
            self.errors.len(),
        )
    }
}

/// Number of headlines carried in [`PipelineResult::news_sample`].
pub const NEWS_SAMPLE_SIZE: usize = 5;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that reject a pipeline invocation before any stage runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fill_missing_never_overwrites() {
        let mut acc = MetricsRecord {
            pe: Some(20.0),
            ..Default::default()
        };
        let incoming = MetricsRecord {
            pe: Some(99.0),
            roe_pct: Some(18.0),
            ..Default::default()
        };
        let filled = acc.fill_missing(&incoming);
        assert_eq!(filled, 1);
        assert_eq!(acc.pe, Some(20.0));
        assert_eq!(acc.roe_pct, Some(18.0));
    }

    #[test]
    fn test_core_complete_ignores_peer_fields() {
        let m = MetricsRecord {
            pe: Some(1.0),
            roe_pct: Some(1.0),
            debt_to_equity: Some(1.0),
            revenue_cagr_pct: Some(1.0),
            ..Default::default()
        };
        assert!(m.is_core_complete());
        assert!(!MetricsRecord::default().is_core_complete());
    }

    #[test]
    fn test_peer_gap_discount() {
        let mut m = MetricsRecord {
            pe: Some(20.0),
            peer_pe: Some(25.0),
            ..Default::default()
        };
        m.derive_peer_gap();
        assert!((m.peer_gap_pct.unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_peer_gap_premium_is_negative() {
        let mut m = MetricsRecord {
            pe: Some(30.0),
            peer_pe: Some(25.0),
            ..Default::default()
        };
        m.derive_peer_gap();
        assert!((m.peer_gap_pct.unwrap() + 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_peer_gap_requires_nonzero_peer() {
        let mut m = MetricsRecord {
            pe: Some(20.0),
            peer_pe: Some(0.0),
            ..Default::default()
        };
        m.derive_peer_gap();
        assert_eq!(m.peer_gap_pct, None);

        let mut no_peer = MetricsRecord {
            pe: Some(20.0),
            ..Default::default()
        };
        no_peer.derive_peer_gap();
        assert_eq!(no_peer.peer_gap_pct, None);
    }

    #[test]
    fn test_non_finite_detection() {
        let m = MetricsRecord {
            roe_pct: Some(f64::NAN),
            ..Default::default()
        };
        assert!(m.has_non_finite());
        assert!(!MetricsRecord::default().has_non_finite());
    }

    #[test]
    fn test_decision_ordering() {
        assert!(Decision::Avoid < Decision::Hold);
        assert!(Decision::Hold < Decision::Buy);
        assert_eq!(serde_json::to_string(&Decision::Buy).unwrap(), "\"BUY\"");
        assert_eq!(format!("{}", Decision::Avoid), "AVOID");
    }

    #[test]
    fn test_thresholds_validation() {
        assert!(Thresholds::default().validate().is_ok());
        let inverted = Thresholds { buy_prob: 0.4, hold_prob: 0.5 };
        assert!(matches!(
            inverted.validate(),
            Err(PipelineError::InvalidConfiguration(_))
        ));
        let out_of_range = Thresholds { buy_prob: 1.5, hold_prob: 0.5 };
        assert!(out_of_range.validate().is_err());
        let equal = Thresholds { buy_prob: 0.5, hold_prob: 0.5 };
        assert!(equal.validate().is_ok());
    }

    #[test]
    fn test_news_item_serializes_with_short_key() {
        let item = NewsItem::new("Zomato: record profit", SentimentLabel::Positive);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["title"], "Zomato: record profit");
        assert_eq!(json["sent"], "positive");
    }

    #[test]
    fn test_fundamentals_view_rounds_and_labels() {
        let m = MetricsRecord {
            pe: Some(20.456),
            roe_pct: Some(15.0),
            ..Default::default()
        };
        let view = FundamentalsView::from(&m);
        assert_eq!(view.pe, Some(dec!(20.46)));
        assert_eq!(view.roe_pct, Some(dec!(15)));
        assert_eq!(view.debt_to_equity, None);

        let json = serde_json::to_value(&view).unwrap();
        assert!((json["P/E"].as_f64().unwrap() - 20.46).abs() < 1e-9);
        assert!(json["D/E"].is_null());
        assert!(json.get("P/E discount vs peer (%)").is_some());
    }
}
