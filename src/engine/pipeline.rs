//! Pipeline orchestrator.
//!
//! Runs one analysis end to end:
//! resolve symbol → news → sentiment → fundamentals → score → predict →
//! decide → explain → assemble.
//!
//! Every fallible stage yields `Result<T, StageError>` and goes through
//! [`Diagnostics::settle`], which records `"<stage>_failed: <error>"` and
//! substitutes the stage default. The only error a run can return is an
//! invalid threshold override, checked before any stage starts.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, PipelineConfig};
use crate::data::news::{NewsChain, NewsError, NewsSource};
use crate::engine::resolver::{FundamentalsResolver, Resolution, ResolveError};
use crate::model::{self, FeatureVector, GainPredictor, Prediction, PredictionError};
use crate::sentiment::{self, clamp_unit, ModelContext, SentimentError, SentimentScorer};
use crate::strategy::{
    build_rationale, decide, effective_thresholds, fallback_rationale, FundamentalScore,
    RationaleInputs, ReasoningError, ScoringEngine, ScoringError,
};
use crate::symbol::{looks_like_ticker, normalize_symbol, StaticSymbolResolver, SymbolResolver};
use crate::types::{
    Decision, FundamentalsView, MetricsRecord, NewsItem, PipelineError, PipelineMeta,
    PipelineRequest, PipelineResult, Thresholds, NEWS_SAMPLE_SIZE,
};

/// Warning added whenever the rationale had to be replaced.
pub const REASONING_FALLBACK: &str = "reasoning_fallback_used";

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolveSymbol,
    FetchNews,
    ScoreSentiment,
    FetchFundamentals,
    ScoreFundamentals,
    Predict,
    Explain,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ResolveSymbol => "resolve_symbol",
            Stage::FetchNews => "fetch_news",
            Stage::ScoreSentiment => "score_sentiment",
            Stage::FetchFundamentals => "fetch_fundamentals",
            Stage::ScoreFundamentals => "score_fundamentals",
            Stage::Predict => "predict",
            Stage::Explain => "explain",
        }
    }
}

/// Failure of a single stage. Never escapes [`Pipeline::run`].
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("empty symbol input")]
    EmptyInput,
    #[error(transparent)]
    News(#[from] NewsError),
    #[error(transparent)]
    Sentiment(#[from] SentimentError),
    #[error(transparent)]
    Fundamentals(#[from] ResolveError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Prediction(#[from] PredictionError),
    #[error(transparent)]
    Reasoning(#[from] ReasoningError),
}

/// Warnings and errors collected over one run.
#[derive(Debug, Default)]
struct Diagnostics {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl Diagnostics {
    fn settle<T>(
        &mut self,
        stage: Stage,
        outcome: Result<T, StageError>,
        default: impl FnOnce() -> T,
    ) -> T {
        match outcome {
            Ok(value) => value,
            Err(e) => {
                warn!(stage = stage.as_str(), error = %e, "Stage failed, using default");
                self.errors.push(format!("{}_failed: {e}", stage.as_str()));
                default()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// External collaborators a [`Pipeline`] is wired with.
pub struct Collaborators {
    pub news: Arc<dyn NewsSource>,
    pub sentiment: Arc<dyn SentimentScorer>,
    pub fundamentals: FundamentalsResolver,
    pub predictor: Arc<dyn GainPredictor>,
    pub symbols: Arc<dyn SymbolResolver>,
}

pub struct Pipeline {
    settings: PipelineConfig,
    thresholds: Thresholds,
    scoring: ScoringEngine,
    news: Arc<dyn NewsSource>,
    sentiment: Arc<dyn SentimentScorer>,
    fundamentals: FundamentalsResolver,
    predictor: Arc<dyn GainPredictor>,
    symbols: Arc<dyn SymbolResolver>,
}

impl Pipeline {
    pub fn new(
        settings: PipelineConfig,
        thresholds: Thresholds,
        scoring: ScoringEngine,
        parts: Collaborators,
    ) -> Self {
        Self {
            settings,
            thresholds,
            scoring,
            news: parts.news,
            sentiment: parts.sentiment,
            fundamentals: parts.fundamentals,
            predictor: parts.predictor,
            symbols: parts.symbols,
        }
    }

    /// Production wiring from configuration. `ctx` is shared so repeated
    /// pipelines reuse one classifier.
    pub fn from_config(cfg: &AppConfig, ctx: Arc<ModelContext>) -> Result<Self> {
        let parts = Collaborators {
            news: Arc::new(NewsChain::from_config(&cfg.news)?),
            sentiment: sentiment::scorer_from_config(&cfg.pipeline, &cfg.sentiment, ctx),
            fundamentals: FundamentalsResolver::from_config(&cfg.fundamentals)?,
            predictor: model::load_or_default(&cfg.model.path)?,
            symbols: Arc::new(StaticSymbolResolver::seeded()),
        };

        info!(
            news_provider = parts.news.provider_name(),
            sentiment = parts.sentiment.name(),
            model = parts.predictor.name(),
            adapters = ?parts.fundamentals.adapter_names(),
            max_concurrency = cfg.fundamentals.max_concurrency,
            "Pipeline wired"
        );

        Ok(Self::new(
            cfg.pipeline.clone(),
            cfg.thresholds,
            ScoringEngine::new(cfg.valuation_weights),
            parts,
        ))
    }

    /// Run one analysis. Always produces a fully populated result unless
    /// the threshold override is invalid.
    pub async fn run(&self, req: PipelineRequest) -> Result<PipelineResult, PipelineError> {
        let thresholds = effective_thresholds(self.thresholds, req.thresholds)?;
        let mut diag = Diagnostics::default();

        info!(
            input = %req.symbol_or_name,
            query = %req.query,
            live_news = self.settings.use_live_news,
            live_sentiment = self.settings.use_live_sentiment,
            "Pipeline run started"
        );

        // -- Symbol ----------------------------------------------------------

        let resolved = self.resolve_symbol(&req);
        let symbol = diag.settle(Stage::ResolveSymbol, resolved, || {
            req.symbol_or_name.trim().to_string()
        });
        debug!(symbol = %symbol, "Symbol resolved");

        // -- News & sentiment ------------------------------------------------

        let fetched = self
            .news
            .fetch(&req.query, self.settings.use_live_news)
            .await
            .map_err(StageError::from);
        let news: Vec<NewsItem> = diag.settle(Stage::FetchNews, fetched, Vec::new);

        let scored = self.sentiment.score(&news).await.map_err(StageError::from);
        let sentiment = clamp_unit(diag.settle(Stage::ScoreSentiment, scored, || 0.0));

        // -- Fundamentals ----------------------------------------------------

        let resolved = self
            .fundamentals
            .resolve(&symbol, req.peer_pe)
            .await
            .map_err(StageError::from);
        let resolution = diag.settle(Stage::FetchFundamentals, resolved, Resolution::default);
        for w in &resolution.warnings {
            diag.warnings.push(w.clone());
            diag.errors.push(format!("fundamentals_adapter_failed: {w}"));
        }
        let metrics: MetricsRecord = resolution.metrics;

        let scored = self.scoring.score(&metrics).map_err(StageError::from);
        let score = diag.settle(Stage::ScoreFundamentals, scored, || {
            FundamentalScore::neutral(self.scoring.weights())
        });

        // -- Prediction & decision ---------------------------------------------

        let features = FeatureVector::build(sentiment, metrics.peer_gap_pct, &score.flags);
        let predicted = self.predict(&features);
        let prediction = diag.settle(Stage::Predict, predicted, || Prediction {
            probability: 0.5,
            expected_gain_pct: 0.0,
        });

        let decision = decide(prediction.probability, thresholds.buy_prob, thresholds.hold_prob);

        let reasoning = explain(
            &mut diag,
            &RationaleInputs {
                symbol: &symbol,
                decision,
                sentiment,
                metrics: &metrics,
                flags: score.flags,
                probability: prediction.probability,
                expected_gain_pct: prediction.expected_gain_pct,
            },
        );

        // -- Assemble ------------------------------------------------------------

        let result = PipelineResult {
            symbol,
            query: req.query,
            sentiment,
            fundamentals: FundamentalsView::from(&metrics),
            probability: prediction.probability,
            expected_gain_pct: prediction.expected_gain_pct,
            decision,
            reasoning,
            news_sample: news.into_iter().take(NEWS_SAMPLE_SIZE).collect(),
            meta: PipelineMeta {
                use_live_news: self.settings.use_live_news,
                use_live_sentiment: self.settings.use_live_sentiment,
                news_provider: self.news.provider_name().to_string(),
                sentiment_strategy: self.sentiment.name().to_string(),
                model: self.predictor.name().to_string(),
                providers_used: resolution.providers_used,
                fundamentals_score: score.composite,
                flags: score.flags,
            },
            warnings: diag.warnings,
            errors: diag.errors,
        };

        info!(
            symbol = %result.symbol,
            decision = %result.decision,
            probability = format!("{:.3}", result.probability),
            sentiment = format!("{:+.3}", result.sentiment),
            warnings = result.warnings.len(),
            errors = result.errors.len(),
            "Pipeline run complete"
        );

        Ok(result)
    }

    fn resolve_symbol(&self, req: &PipelineRequest) -> Result<String, StageError> {
        let raw = req.symbol_or_name.trim();
        if raw.is_empty() {
            return Err(StageError::EmptyInput);
        }
        if req.symbol_is_final {
            return Ok(raw.to_string());
        }

        let picked = if looks_like_ticker(raw) {
            raw.to_string()
        } else {
            match self.symbols.resolve(raw) {
                Some(sym) => {
                    debug!(name = raw, symbol = %sym, "Name resolved to ticker");
                    sym
                }
                None => raw.to_string(),
            }
        };
        normalize_symbol(&picked).ok_or(StageError::EmptyInput)
    }

    /// Predictor output outside `[0, 1]` is treated as a failure.
    fn predict(&self, features: &FeatureVector) -> Result<Prediction, StageError> {
        let p = self.predictor.predict(features)?;
        if !p.probability.is_finite()
            || !(0.0..=1.0).contains(&p.probability)
            || !p.expected_gain_pct.is_finite()
        {
            return Err(PredictionError::NonFiniteOutput.into());
        }
        Ok(p)
    }
}

/// Build the rationale, or the fallback text plus a warning.
fn explain(diag: &mut Diagnostics, inputs: &RationaleInputs<'_>) -> String {
    let built = build_rationale(inputs).map_err(StageError::from);
    let fell_back = built.is_err();
    let text = diag.settle(Stage::Explain, built, || {
        fallback_rationale(inputs.decision, inputs.symbol)
    });
    if fell_back {
        diag.warnings.push(REASONING_FALLBACK.to_string());
    }
    text
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
