//! Gain probability estimation.
//!
//! Predictors map a fixed six-element [`FeatureVector`] to the probability
//! that the instrument gains, plus an expected gain derived from it:
//! `gain = round1(-10 + 40 * p)`, i.e. p = 0 maps to -10% and p = 1 to
//! +30%.
//!
//! Two implementations:
//! - [`HeuristicPredictor`]: fixed linear rule, no file needed.
//! - [`LogisticPredictor`]: logistic regression loaded from JSON.
//!
//! [`load_or_default`] picks the logistic model when its file exists.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::types::Flags;

pub const FEATURE_COUNT: usize = 6;

const PROB_FLOOR: f64 = 0.01;
const PROB_CEIL: f64 = 0.99;

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

/// `[sentiment, peer_gap_fraction, roe_flag, leverage_flag, growth_flag,
/// flag_composite]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    /// `peer_gap_pct` is a percentage; it enters as a fraction, 0 when
    /// unknown.
    pub fn build(sentiment: f64, peer_gap_pct: Option<f64>, flags: &Flags) -> Self {
        let bit = |b: bool| if b { 1.0 } else { 0.0 };
        let roe = bit(flags.roe_ok);
        let lev = bit(flags.leverage_ok);
        let growth = bit(flags.growth_ok);
        let composite = 0.33 * roe + 0.33 * lev + 0.34 * growth;
        Self([
            sentiment,
            peer_gap_pct.map(|g| g / 100.0).unwrap_or(0.0),
            roe,
            lev,
            growth,
            composite,
        ])
    }

    pub fn sentiment(&self) -> f64 {
        self.0[0]
    }

    pub fn flag_composite(&self) -> f64 {
        self.0[5]
    }

    fn is_finite(&self) -> bool {
        self.0.iter().all(|x| x.is_finite())
    }
}

// ---------------------------------------------------------------------------
// Predictors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub probability: f64,
    pub expected_gain_pct: f64,
}

impl Prediction {
    /// Derive the expected gain from a probability.
    pub fn from_probability(p: f64) -> Self {
        let gain = -10.0 + 40.0 * p;
        Self {
            probability: p,
            expected_gain_pct: (gain * 10.0).round() / 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictionError {
    #[error("non-finite feature vector: {0:?}")]
    NonFiniteInput([f64; FEATURE_COUNT]),
    #[error("model produced non-finite probability")]
    NonFiniteOutput,
}

pub trait GainPredictor: Send + Sync {
    /// Identifier reported in the result metadata.
    fn name(&self) -> &str;

    fn predict(&self, features: &FeatureVector) -> Result<Prediction, PredictionError>;
}

/// `p = clip(0.5 + 0.25 * sentiment + 0.15 * flag_composite, 0.01, 0.99)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicPredictor;

impl GainPredictor for HeuristicPredictor {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn predict(&self, x: &FeatureVector) -> Result<Prediction, PredictionError> {
        if !x.is_finite() {
            return Err(PredictionError::NonFiniteInput(x.0));
        }
        let p = (0.5 + 0.25 * x.sentiment() + 0.15 * x.flag_composite()).clamp(PROB_FLOOR, PROB_CEIL);
        Ok(Prediction::from_probability(p))
    }
}

/// Serialized form of a trained logistic model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    pub coefficients: [f64; FEATURE_COUNT],
}

#[derive(Debug, Clone)]
pub struct LogisticPredictor {
    model: LogisticModel,
    name: String,
}

impl LogisticPredictor {
    pub fn new(model: LogisticModel, name: impl Into<String>) -> Self {
        Self {
            model,
            name: name.into(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file: {}", path.display()))?;
        let model: LogisticModel = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse model file: {}", path.display()))?;
        anyhow::ensure!(
            model.intercept.is_finite() && model.coefficients.iter().all(|c| c.is_finite()),
            "Model file {} contains non-finite weights",
            path.display()
        );
        Ok(Self::new(model, format!("logistic:{}", path.display())))
    }
}

impl GainPredictor for LogisticPredictor {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, x: &FeatureVector) -> Result<Prediction, PredictionError> {
        if !x.is_finite() {
            return Err(PredictionError::NonFiniteInput(x.0));
        }
        let z = self.model.intercept
            + self
                .model
                .coefficients
                .iter()
                .zip(x.0.iter())
                .map(|(w, v)| w * v)
                .sum::<f64>();
        let p = 1.0 / (1.0 + (-z).exp());
        if !p.is_finite() {
            return Err(PredictionError::NonFiniteOutput);
        }
        Ok(Prediction::from_probability(p.clamp(PROB_FLOOR, PROB_CEIL)))
    }
}

/// Logistic model from `path` if the file exists, heuristic otherwise. A
/// file that exists but cannot be loaded is an error.
pub fn load_or_default(path: &str) -> Result<Arc<dyn GainPredictor>> {
    let p = Path::new(path);
    if p.exists() {
        let predictor = LogisticPredictor::load(p)?;
        info!(model = predictor.name(), "Loaded gain model");
        Ok(Arc::new(predictor))
    } else {
        warn!(path, "Gain model file not found, using heuristic predictor");
        Ok(Arc::new(HeuristicPredictor))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
