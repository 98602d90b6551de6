//! Statistical headline sentiment via a FinBERT-style classifier.
//!
//! The classifier is expensive to set up, so it lives in a
//! [`ModelContext`] that initializes it at most once per process. The
//! outcome of that single attempt (success or failure) is kept; a failed
//! initialization is not retried and every later call goes straight to the
//! keyword fallback.
//!
//! Scoring is the mean over headlines of `P(positive) - P(negative)`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::rules::label_score;
use super::{clamp_unit, SentimentError, SentimentScorer};
use crate::config::{AppConfig, SentimentConfig};
use crate::types::NewsItem;

const HF_INFERENCE_URL: &str = "https://api-inference.huggingface.co";

// ---------------------------------------------------------------------------
// Classifier abstraction
// ---------------------------------------------------------------------------

/// Three-way class probabilities for one headline.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassProbs {
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
}

impl ClassProbs {
    /// Expectation with weights -1 / 0 / +1.
    pub fn expectation(&self) -> f64 {
        self.positive - self.negative
    }
}

#[async_trait]
pub trait HeadlineClassifier: Send + Sync {
    /// One [`ClassProbs`] per input headline, same order.
    async fn classify(&self, headlines: &[String]) -> Result<Vec<ClassProbs>, SentimentError>;
}

type InitOutcome = Result<Arc<dyn HeadlineClassifier>, SentimentError>;

/// Builds the classifier on first use.
pub type ClassifierFactory = Box<dyn Fn() -> BoxFuture<'static, InitOutcome> + Send + Sync>;

/// Process-wide holder for the classifier handle.
pub struct ModelContext {
    factory: ClassifierFactory,
    cell: OnceCell<InitOutcome>,
}

impl ModelContext {
    pub fn new(factory: ClassifierFactory) -> Self {
        Self {
            factory,
            cell: OnceCell::new(),
        }
    }

    /// Context whose classifier is the hosted inference endpoint. The API
    /// token is read from the environment when the classifier is first
    /// needed, not here.
    pub fn hosted(cfg: &SentimentConfig) -> Self {
        let cfg = cfg.clone();
        Self::new(Box::new(move || build_hosted(cfg.clone()).boxed()))
    }

    /// The classifier, initializing it on the first call. Concurrent first
    /// callers wait on the same initialization.
    pub async fn classifier(&self) -> InitOutcome {
        self.cell.get_or_init(|| (self.factory)()).await.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl fmt::Debug for ModelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.cell.get() {
            None => "uninitialized",
            Some(Ok(_)) => "ready",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("ModelContext").field("state", &state).finish()
    }
}

async fn build_hosted(cfg: SentimentConfig) -> InitOutcome {
    let token = AppConfig::secret_from_env(&cfg.api_key_env)
        .ok_or_else(|| SentimentError::Unavailable(format!("{} not set", cfg.api_key_env)))?;
    let client = HostedFinbert::new(token, &cfg.model, cfg.max_len, cfg.timeout())
        .map_err(|e| SentimentError::Unavailable(format!("{e:#}")))?;
    info!(model = %cfg.model, "Sentiment classifier ready");
    Ok(Arc::new(client))
}

// ---------------------------------------------------------------------------
// Hosted inference client
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a [String],
    parameters: InferenceParams,
}

#[derive(Debug, Serialize)]
struct InferenceParams {
    truncation: bool,
    max_length: usize,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Batched input answers with one list per headline; a single input may
/// come back flat.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Batch(Vec<Vec<LabelScore>>),
    Single(Vec<LabelScore>),
}

/// Text-classification client for a hosted FinBERT model.
pub struct HostedFinbert {
    http: Client,
    token: SecretString,
    model: String,
    max_len: usize,
    base_url: String,
}

impl HostedFinbert {
    pub fn new(token: SecretString, model: &str, max_len: usize, timeout: Duration) -> Result<Self> {
        Self::with_base_url(token, model, max_len, HF_INFERENCE_URL, timeout)
    }

    pub fn with_base_url(
        token: SecretString,
        model: &str,
        max_len: usize,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build inference HTTP client")?;
        Ok(Self {
            http,
            token,
            model: model.to_string(),
            max_len,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn to_probs(scores: &[LabelScore]) -> Result<ClassProbs, SentimentError> {
        let mut probs = ClassProbs::default();
        for s in scores {
            match s.label.to_ascii_lowercase().as_str() {
                "positive" => probs.positive = s.score,
                "negative" => probs.negative = s.score,
                "neutral" => probs.neutral = s.score,
                other => {
                    return Err(SentimentError::Inference(format!("unexpected label '{other}'")))
                }
            }
        }
        Ok(probs)
    }
}

#[async_trait]
impl HeadlineClassifier for HostedFinbert {
    async fn classify(&self, headlines: &[String]) -> Result<Vec<ClassProbs>, SentimentError> {
        let request = InferenceRequest {
            inputs: headlines,
            parameters: InferenceParams {
                truncation: true,
                max_length: self.max_len,
            },
        };

        let resp = self
            .http
            .post(format!("{}/models/{}", self.base_url, self.model))
            .bearer_auth(self.token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| SentimentError::Inference(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SentimentError::Inference(format!(
                "HTTP {status}: {}",
                body.chars().take(150).collect::<String>()
            )));
        }

        let parsed: InferenceResponse = resp
            .json()
            .await
            .map_err(|e| SentimentError::Inference(format!("malformed response: {e}")))?;

        let rows = match parsed {
            InferenceResponse::Batch(rows) => rows,
            InferenceResponse::Single(row) => vec![row],
        };
        if rows.len() != headlines.len() {
            return Err(SentimentError::Inference(format!(
                "expected {} results, got {}",
                headlines.len(),
                rows.len()
            )));
        }
        rows.iter().map(|r| Self::to_probs(r)).collect()
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

pub struct StatisticalScorer {
    ctx: Arc<ModelContext>,
    name: String,
    timeout: Duration,
}

impl StatisticalScorer {
    pub fn new(ctx: Arc<ModelContext>, model: &str, timeout: Duration) -> Self {
        Self {
            ctx,
            name: format!("finbert:{model}"),
            timeout,
        }
    }

    async fn infer(&self, headlines: &[String]) -> Result<f64, SentimentError> {
        let classifier = self.ctx.classifier().await?;
        let probs = tokio::time::timeout(self.timeout, classifier.classify(headlines))
            .await
            .map_err(|_| SentimentError::Timeout)??;

        if probs.len() != headlines.len() {
            return Err(SentimentError::Inference(format!(
                "classifier returned {} results for {} headlines",
                probs.len(),
                headlines.len()
            )));
        }
        let mean = probs.iter().map(ClassProbs::expectation).sum::<f64>() / probs.len() as f64;
        Ok(clamp_unit(mean))
    }
}

#[async_trait]
impl SentimentScorer for StatisticalScorer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score(&self, items: &[NewsItem]) -> Result<f64, SentimentError> {
        let headlines: Vec<String> = items
            .iter()
            .map(|i| i.title.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if headlines.is_empty() {
            return Ok(0.0);
        }

        match self.infer(&headlines).await {
            Ok(score) => {
                debug!(headlines = headlines.len(), score, "Statistical sentiment");
                Ok(score)
            }
            Err(e) => {
                warn!(error = %e, "Statistical sentiment unavailable, using keyword rules");
                Ok(label_score(items))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
