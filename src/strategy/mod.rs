//! Strategy layer: fundamentals scoring, then the threshold decision and
//! its rationale.

pub mod decision;
pub mod scoring;

pub use decision::{
    build_rationale, decide, effective_thresholds, fallback_rationale, RationaleInputs,
    ReasoningError,
};
pub use scoring::{flags_for, FundamentalScore, ScoreDetails, ScoringEngine, ScoringError};
