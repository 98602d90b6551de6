//! Keyword sentiment for IPO and listing headlines.

use async_trait::async_trait;

use super::{clamp_unit, SentimentError, SentimentScorer};
use crate::types::{NewsItem, SentimentLabel};

const POSITIVE_KEYWORDS: &[&str] = &[
    "strong", "robust", "beats", "record", "growth", "surge", "gmp up",
    "oversubscribed", "solid", "subscription", "upgraded", "profit",
    "order book", "margin expansion", "bumper", "subscribe",
];

const NEGATIVE_KEYWORDS: &[&str] = &[
    "probe", "flag", "warning", "decline", "fall", "downgrade", "delay",
    "sebi", "fraud", "scam", "controversy", "penalty", "loss", "issue",
    "allegation", "penalised", "adverse",
];

/// Label one headline. Substring match on the lower-cased text; a headline
/// hitting both lists (or neither) is neutral.
pub fn classify_headline(title: &str) -> SentimentLabel {
    let t = title.to_lowercase();
    let pos = POSITIVE_KEYWORDS.iter().any(|k| t.contains(k));
    let neg = NEGATIVE_KEYWORDS.iter().any(|k| t.contains(k));
    match (pos, neg) {
        (true, false) => SentimentLabel::Positive,
        (false, true) => SentimentLabel::Negative,
        _ => SentimentLabel::Neutral,
    }
}

/// Mean label polarity. Empty input scores exactly 0.0.
pub fn label_score(items: &[NewsItem]) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    let total: f64 = items.iter().map(|i| i.sentiment.polarity()).sum();
    clamp_unit(total / items.len() as f64)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleScorer;

#[async_trait]
impl SentimentScorer for RuleScorer {
    fn name(&self) -> &str {
        "rules"
    }

    async fn score(&self, items: &[NewsItem]) -> Result<f64, SentimentError> {
        Ok(label_score(items))
    }
}
