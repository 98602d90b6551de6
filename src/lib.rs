//! IPOBot: multi-source news and fundamentals analysis for listed and
//! upcoming instruments.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod data;
pub mod sentiment;
pub mod strategy;
pub mod model;
pub mod symbol;
pub mod engine;
