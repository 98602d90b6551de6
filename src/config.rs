//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime into [`SecretString`]s.
//!
//! Every section has defaults, so a partial (or empty) file is valid.
//! Unknown news provider names are rejected while parsing, before any
//! pipeline run.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::data::news::NewsProviderKind;
use crate::types::{PipelineError, Thresholds};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub thresholds: Thresholds,
    pub valuation_weights: ValuationWeights,
    pub news: NewsConfig,
    pub sentiment: SentimentConfig,
    pub fundamentals: FundamentalsConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Query live news providers instead of the canned sample.
    pub use_live_news: bool,
    /// Use the statistical headline classifier instead of keyword rules.
    pub use_live_sentiment: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ValuationWeights {
    /// Weight of the peer P/E discount component.
    pub pe_under_peer_bonus: f64,
    /// Weight of the ROE bucket component.
    pub roe_bonus: f64,
}

impl Default for ValuationWeights {
    fn default() -> Self {
        Self {
            pe_under_peer_bonus: 0.15,
            roe_bonus: 0.10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NewsConfig {
    pub provider: NewsProviderKind,
    /// Env var holding the primary provider's API key.
    pub api_key_env: String,
    pub language: String,
    pub page_size: usize,
    pub timeout_secs: u64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            provider: NewsProviderKind::Gnews,
            api_key_env: "GNEWS_API_KEY".to_string(),
            language: "en".to_string(),
            page_size: 8,
            timeout_secs: 12,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SentimentConfig {
    /// Hosted classifier model id.
    pub model: String,
    /// Token truncation length passed to the classifier.
    pub max_len: usize,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            model: "ProsusAI/finbert".to_string(),
            max_len: 128,
            api_key_env: "HF_API_TOKEN".to_string(),
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FundamentalsConfig {
    /// Per-adapter deadline.
    pub timeout_secs: u64,
    /// Adapters in flight at once. 1 = strictly sequential with early exit.
    pub max_concurrency: usize,
    pub finnhub_key_env: String,
    pub fmp_key_env: String,
    pub alphavantage_key_env: String,
}

impl Default for FundamentalsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 12,
            max_concurrency: 1,
            finnhub_key_env: "FINNHUB_API_KEY".to_string(),
            fmp_key_env: "FMP_API_KEY".to_string(),
            alphavantage_key_env: "ALPHAVANTAGE_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    /// JSON logistic model. Missing file = heuristic predictor.
    pub path: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "models/gain_model.json".to_string(),
        }
    }
}

impl NewsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SentimentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl FundamentalsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no pipeline run could honour.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.thresholds.validate()?;

        let w = &self.valuation_weights;
        if !w.pe_under_peer_bonus.is_finite() || !w.roe_bonus.is_finite() {
            return Err(PipelineError::InvalidConfiguration(
                "valuation weights must be finite".into(),
            ));
        }
        if self.news.page_size == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "news.page_size must be at least 1".into(),
            ));
        }
        if self.fundamentals.max_concurrency == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "fundamentals.max_concurrency must be at least 1".into(),
            ));
        }
        if self.news.timeout_secs == 0
            || self.sentiment.timeout_secs == 0
            || self.fundamentals.timeout_secs == 0
        {
            return Err(PipelineError::InvalidConfiguration(
                "timeouts must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Resolve an optional secret. Unset or blank variables yield `None`.
    pub fn secret_from_env(env_name: &str) -> Option<SecretString> {
        std::env::var(env_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(SecretString::new)
    }
}
