//! Core engine: the fundamentals resolver and the stage-isolated pipeline
//! that sequences news, sentiment, fundamentals, prediction and decision.

pub mod pipeline;
pub mod resolver;

pub use pipeline::{Collaborators, Pipeline, Stage, StageError};
pub use resolver::{FundamentalsResolver, Resolution, ResolveError};
