//! IPOBot command-line entry point.
//!
//! Loads `.env` and `config.toml`, initialises structured logging, runs a
//! single analysis and prints the result as pretty JSON.
//!
//! Usage: `ipobot <symbol-or-name> [query]`

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::info;

use ipobot::config::AppConfig;
use ipobot::engine::Pipeline;
use ipobot::sentiment::ModelContext;
use ipobot::types::PipelineRequest;

const DEFAULT_CONFIG: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next() else {
        bail!("usage: ipobot <symbol-or-name> [query]");
    };
    let query = args
        .next()
        .unwrap_or_else(|| format!("{input} IPO latest news"));

    let config_path =
        std::env::var("IPOBOT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let cfg = if std::path::Path::new(&config_path).exists() {
        AppConfig::load(&config_path)?
    } else {
        info!(path = %config_path, "Config file not found, using defaults");
        AppConfig::default()
    };

    info!(
        config = %config_path,
        live_news = cfg.pipeline.use_live_news,
        live_sentiment = cfg.pipeline.use_live_sentiment,
        news_provider = %cfg.news.provider,
        "IPOBot starting"
    );

    let ctx = Arc::new(ModelContext::hosted(&cfg.sentiment));
    let pipeline = Pipeline::from_config(&cfg, ctx)?;

    let result = pipeline.run(PipelineRequest::new(input, query)).await?;
    info!(summary = %result, "Analysis finished");

    let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
    println!("{json}");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ipobot=info"));

    if std::env::var("IPOBOT_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
