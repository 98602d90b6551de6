//! End-to-end pipeline runs against deterministic collaborators.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{calls, metrics, FakeAdapter, FixedNews};
use ipobot::config::{NewsConfig, PipelineConfig};
use ipobot::data::news::{NewsChain, NewsSource};
use ipobot::data::{AdapterError, AdapterKind, SourceAdapter};
use ipobot::engine::{Collaborators, FundamentalsResolver, Pipeline};
use ipobot::model::HeuristicPredictor;
use ipobot::sentiment::RuleScorer;
use ipobot::strategy::ScoringEngine;
use ipobot::symbol::StaticSymbolResolver;
use ipobot::types::{Decision, Flags, PipelineError, PipelineRequest, ThresholdOverride, Thresholds};
use rust_decimal_macros::dec;

fn build(news: Arc<dyn NewsSource>, adapters: Vec<Box<dyn SourceAdapter>>) -> Pipeline {
    Pipeline::new(
        PipelineConfig::default(),
        Thresholds::default(),
        ScoringEngine::default(),
        Collaborators {
            news,
            sentiment: Arc::new(RuleScorer),
            fundamentals: FundamentalsResolver::new(adapters, Duration::from_secs(2), 1),
            predictor: Arc::new(HeuristicPredictor),
            symbols: Arc::new(StaticSymbolResolver::seeded()),
        },
    )
}

fn sample_news() -> Arc<dyn NewsSource> {
    Arc::new(NewsChain::from_config(&NewsConfig::default()).unwrap())
}

fn strong_fundamentals() -> Vec<Box<dyn SourceAdapter>> {
    vec![FakeAdapter::ok(AdapterKind::Metrics, "finnhub", metrics(20.0, 22.0, 0.8, 25.0)).boxed()]
}

#[tokio::test]
async fn test_offline_run_end_to_end() {
    let pipeline = build(sample_news(), strong_fundamentals());
    let mut req = PipelineRequest::new("Zomato", "Zomato IPO latest news");
    req.peer_pe = Some(25.0);

    let res = pipeline.run(req).await.unwrap();

    assert_eq!(res.symbol, "ZOMATO.NS");
    assert_eq!(res.news_sample.len(), 5);
    assert!(res.news_sample[0].title.starts_with("Zomato IPO latest news: "));
    // pos, pos, neg, pos, neg
    assert!((res.sentiment - 0.2).abs() < 1e-12);

    assert_eq!(res.fundamentals.pe, Some(dec!(20)));
    assert_eq!(res.fundamentals.peer_gap_pct, Some(dec!(20)));
    assert_eq!(
        res.meta.flags,
        Flags {
            roe_ok: true,
            leverage_ok: true,
            growth_ok: true
        }
    );
    assert!((res.meta.fundamentals_score - 0.13).abs() < 1e-9);
    assert_eq!(res.meta.providers_used, vec!["finnhub"]);
    assert_eq!(res.meta.news_provider, "gnews");
    assert_eq!(res.meta.sentiment_strategy, "rules");
    assert_eq!(res.meta.model, "heuristic");

    // 0.5 + 0.25 * 0.2 + 0.15 * 1.0
    assert!((res.probability - 0.7).abs() < 1e-9);
    assert_eq!(res.expected_gain_pct, 18.0);
    assert_eq!(res.decision, Decision::Buy);
    assert!(res.reasoning.starts_with("**BUY** for ZOMATO.NS because:"));
    assert!(res.reasoning.contains("Valuation cheaper than peers"));
    assert!(res.errors.is_empty());
    assert!(res.warnings.is_empty());
}

#[tokio::test]
async fn test_repeated_runs_are_identical() {
    let pipeline = build(sample_news(), strong_fundamentals());
    let req = PipelineRequest::new("TSLA", "TSLA IPO latest news");

    let first = pipeline.run(req.clone()).await.unwrap();
    let second = pipeline.run(req).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn test_all_adapters_fail_still_decides() {
    let adapters = vec![
        FakeAdapter::failing(
            AdapterKind::ExchangeQuote,
            "nse",
            AdapterError::Transport("HTTP 403".into()),
        )
        .boxed(),
        FakeAdapter::failing(
            AdapterKind::Metrics,
            "finnhub",
            AdapterError::Unavailable("Finnhub API key not configured".into()),
        )
        .boxed(),
        FakeAdapter::failing(AdapterKind::Statements, "fmp", AdapterError::Parse("bad".into()))
            .boxed(),
        FakeAdapter::failing(AdapterKind::Overview, "alphavantage", AdapterError::Empty).boxed(),
        FakeAdapter::failing(
            AdapterKind::PriceHistory,
            "yahoo",
            AdapterError::Transport("timed out".into()),
        )
        .boxed(),
    ];
    let pipeline = build(sample_news(), adapters);

    let res = pipeline
        .run(PipelineRequest::new("ACME.NS", "ACME IPO latest news"))
        .await
        .unwrap();

    assert_eq!(res.fundamentals, Default::default());
    assert_eq!(res.meta.fundamentals_score, 0.0);
    assert_eq!(res.meta.flags, Flags::default());
    assert!(res.meta.providers_used.is_empty());

    let adapter_errors: Vec<&String> = res
        .errors
        .iter()
        .filter(|e| e.starts_with("fundamentals_adapter_failed: "))
        .collect();
    assert_eq!(adapter_errors.len(), 5);
    assert_eq!(
        adapter_errors[0],
        "fundamentals_adapter_failed: nse: transport error: HTTP 403"
    );
    assert_eq!(res.errors.len(), 5);

    // Sample sentiment 0.2, no flags: 0.5 + 0.05 = 0.55.
    assert!((res.probability - 0.55).abs() < 1e-9);
    assert_eq!(res.expected_gain_pct, 12.0);
    assert_eq!(res.decision, Decision::Hold);
}

#[tokio::test]
async fn test_empty_news_is_neutral_and_mixed() {
    let pipeline = build(Arc::new(FixedNews::new(vec![])), vec![]);

    let res = pipeline
        .run(PipelineRequest::new("TSLA", "TSLA IPO latest news"))
        .await
        .unwrap();

    assert_eq!(res.sentiment, 0.0);
    assert!(res.news_sample.is_empty());
    assert!(res.reasoning.contains("- News sentiment mixed (+0.00)"));
    assert_eq!(res.probability, 0.5);
    assert_eq!(res.decision, Decision::Hold);
    assert!(res.errors.is_empty());
}

#[tokio::test]
async fn test_threshold_override_changes_decision() {
    let pipeline = build(sample_news(), strong_fundamentals());

    let mut req = PipelineRequest::new("TSLA", "q");
    req.thresholds = Some(ThresholdOverride {
        buy_prob: Some(0.9),
        hold_prob: None,
    });
    let res = pipeline.run(req).await.unwrap();
    assert_eq!(res.decision, Decision::Hold);

    let mut bad = PipelineRequest::new("TSLA", "q");
    bad.thresholds = Some(ThresholdOverride {
        buy_prob: Some(0.4),
        hold_prob: Some(0.5),
    });
    assert!(matches!(
        pipeline.run(bad).await,
        Err(PipelineError::InvalidConfiguration(_))
    ));
}

#[tokio::test]
async fn test_exchange_adapter_only_sees_ns_symbols() {
    let nse = FakeAdapter::ok(
        AdapterKind::ExchangeQuote,
        "nse",
        ipobot::types::MetricsRecord {
            pe: Some(60.0),
            ..Default::default()
        },
    )
    .ns_only();
    let nse_calls = nse.counter();
    let pipeline = build(sample_news(), vec![nse.boxed()]);

    let res = pipeline.run(PipelineRequest::new("TSLA", "q")).await.unwrap();
    assert_eq!(calls(&nse_calls), 0);
    assert!(res.errors.is_empty());
    assert_eq!(res.fundamentals.pe, None);

    let res = pipeline.run(PipelineRequest::new("NSE:LICI", "q")).await.unwrap();
    assert_eq!(calls(&nse_calls), 1);
    assert_eq!(res.symbol, "LICI.NS");
    assert_eq!(res.meta.providers_used, vec!["nse"]);
}
