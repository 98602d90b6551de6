//! Headline sentiment scoring.
//!
//! Two strategies sit behind [`SentimentScorer`]:
//! - [`rules::RuleScorer`]: averages the keyword labels assigned at fetch
//!   time. Always available.
//! - [`finbert::StatisticalScorer`]: asks a FinBERT-style classifier for
//!   class probabilities and falls back to the rules on any failure.
//!
//! Both produce a value in `[-1, 1]`; an empty headline list scores 0.0.

pub mod finbert;
pub mod rules;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{PipelineConfig, SentimentConfig};
use crate::types::NewsItem;

pub use finbert::{ModelContext, StatisticalScorer};
pub use rules::RuleScorer;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SentimentError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("inference timed out")]
    Timeout,
}

/// Aggregate a set of headlines into one score.
#[async_trait]
pub trait SentimentScorer: Send + Sync {
    /// Strategy identifier reported in the result metadata.
    fn name(&self) -> &str;

    async fn score(&self, items: &[NewsItem]) -> Result<f64, SentimentError>;
}

/// Clamp into `[-1, 1]`; non-finite input collapses to neutral.
pub fn clamp_unit(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Pick the strategy the config asks for. The statistical scorer shares
/// the caller's [`ModelContext`] so the classifier is built at most once
/// per process.
pub fn scorer_from_config(
    pipeline: &PipelineConfig,
    cfg: &SentimentConfig,
    ctx: Arc<ModelContext>,
) -> Arc<dyn SentimentScorer> {
    if pipeline.use_live_sentiment {
        Arc::new(StatisticalScorer::new(ctx, &cfg.model, cfg.timeout()))
    } else {
        Arc::new(RuleScorer)
    }
}
