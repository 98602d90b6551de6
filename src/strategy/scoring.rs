//! Fundamentals scoring.
//!
//! Turns a [`MetricsRecord`] into quality flags and a small bounded
//! composite. The composite has two weighted components:
//! - peer valuation gap, as a fraction clamped to `[-1, 1]`
//! - ROE, bucketed into 0 / 0.25 / 0.5 / 0.75 / 1.0
//!
//! With default weights the composite therefore lies in `[-0.15, 0.25]`.

use serde::Serialize;
use tracing::debug;

use crate::config::ValuationWeights;
use crate::types::{Flags, MetricsRecord};

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// ROE (%) at or above which `roe_ok` holds.
pub const ROE_OK_PCT: f64 = 15.0;
/// D/E at or below which `leverage_ok` holds.
pub const LEVERAGE_OK_MAX: f64 = 1.0;
/// Revenue CAGR (%) at or above which `growth_ok` holds.
pub const GROWTH_OK_PCT: f64 = 20.0;

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreDetails {
    pub pe_component: f64,
    pub roe_component: f64,
    pub pe_weight: f64,
    pub roe_weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FundamentalScore {
    pub composite: f64,
    pub flags: Flags,
    pub details: ScoreDetails,
}

impl FundamentalScore {
    /// Neutral stand-in used when scoring fails.
    pub fn neutral(weights: &ValuationWeights) -> Self {
        Self {
            composite: 0.0,
            flags: Flags::default(),
            details: ScoreDetails {
                pe_component: 0.0,
                roe_component: 0.0,
                pe_weight: weights.pe_under_peer_bonus,
                roe_weight: weights.roe_bonus,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("non-finite metric: {0}")]
    NonFinite(String),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub fn flags_for(m: &MetricsRecord) -> Flags {
    Flags {
        roe_ok: m.roe_pct.is_some_and(|r| r >= ROE_OK_PCT),
        leverage_ok: m.debt_to_equity.is_some_and(|d| d <= LEVERAGE_OK_MAX),
        growth_ok: m.revenue_cagr_pct.is_some_and(|g| g >= GROWTH_OK_PCT),
    }
}

/// Step function over ROE (%).
pub fn roe_bucket(roe_pct: f64) -> f64 {
    match roe_pct {
        r if r >= 20.0 => 1.0,
        r if r >= 15.0 => 0.75,
        r if r >= 10.0 => 0.5,
        r if r >= 5.0 => 0.25,
        _ => 0.0,
    }
}

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    weights: ValuationWeights,
}

impl ScoringEngine {
    pub fn new(weights: ValuationWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ValuationWeights {
        &self.weights
    }

    pub fn score(&self, m: &MetricsRecord) -> Result<FundamentalScore, ScoringError> {
        if m.has_non_finite() {
            return Err(ScoringError::NonFinite(m.to_string()));
        }

        let w = &self.weights;
        let pe_component = m
            .peer_gap_pct
            .map(|gap| (gap / 100.0).clamp(-1.0, 1.0) * w.pe_under_peer_bonus)
            .unwrap_or(0.0);
        let roe_component = m.roe_pct.map(roe_bucket).unwrap_or(0.0) * w.roe_bonus;
        let composite = pe_component + roe_component;
        let flags = flags_for(m);

        debug!(
            composite = format!("{composite:.4}"),
            pe_component = format!("{pe_component:.4}"),
            roe_component = format!("{roe_component:.4}"),
            roe_ok = flags.roe_ok,
            leverage_ok = flags.leverage_ok,
            growth_ok = flags.growth_ok,
            "Fundamentals scored"
        );

        Ok(FundamentalScore {
            composite,
            flags,
            details: ScoreDetails {
                pe_component,
                roe_component,
                pe_weight: w.pe_under_peer_bonus,
                roe_weight: w.roe_bonus,
            },
        })
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ValuationWeights::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
