//! Fundamentals resolver behaviour across execution modes.
//!
//! Adapters are given delays inversely proportional to their priority so
//! that in concurrent mode the lowest-priority result arrives first.

mod common;

use std::time::Duration;

use common::{calls, metrics, FakeAdapter};
use ipobot::data::{AdapterError, AdapterKind, SourceAdapter};
use ipobot::engine::FundamentalsResolver;
use ipobot::types::MetricsRecord;
use proptest::prelude::*;

fn partial(pe: Option<f64>, roe: Option<f64>, de: Option<f64>, cagr: Option<f64>) -> MetricsRecord {
    MetricsRecord {
        pe,
        roe_pct: roe,
        debt_to_equity: de,
        revenue_cagr_pct: cagr,
        ..Default::default()
    }
}

/// Each adapter knows a different subset. `delays_ms` is indexed by
/// priority: NSE, Finnhub, FMP, Alpha Vantage, Yahoo.
fn chain_with_delays(delays_ms: [u64; 5]) -> Vec<Box<dyn SourceAdapter>> {
    let d = |i: usize| Duration::from_millis(delays_ms[i]);
    vec![
        FakeAdapter::ok(AdapterKind::PriceHistory, "yahoo", metrics(50.0, 5.0, 3.0, 1.0))
            .delayed(d(4))
            .boxed(),
        FakeAdapter::ok(
            AdapterKind::Overview,
            "alphavantage",
            partial(Some(40.0), None, Some(2.0), None),
        )
        .delayed(d(3))
        .boxed(),
        FakeAdapter::failing(
            AdapterKind::Statements,
            "fmp",
            AdapterError::Transport("HTTP 429".into()),
        )
        .delayed(d(2))
        .boxed(),
        FakeAdapter::ok(
            AdapterKind::Metrics,
            "finnhub",
            partial(Some(30.0), Some(18.0), None, None),
        )
        .delayed(d(1))
        .boxed(),
        FakeAdapter::ok(
            AdapterKind::ExchangeQuote,
            "nse",
            partial(Some(25.0), None, None, None),
        )
        .delayed(d(0))
        .boxed(),
    ]
}

/// The slowest adapter is the most trusted.
fn reversed_chain() -> Vec<Box<dyn SourceAdapter>> {
    chain_with_delays([160, 120, 80, 40, 0])
}

#[tokio::test]
async fn test_concurrent_merge_follows_priority_not_completion() {
    let resolver = FundamentalsResolver::new(reversed_chain(), Duration::from_secs(2), 5);
    let res = resolver.resolve("ACME.NS", Some(50.0)).await.unwrap();

    assert_eq!(res.metrics.pe, Some(25.0));
    assert_eq!(res.metrics.roe_pct, Some(18.0));
    assert_eq!(res.metrics.debt_to_equity, Some(2.0));
    assert_eq!(res.metrics.revenue_cagr_pct, Some(1.0));
    assert_eq!(res.metrics.peer_pe, Some(50.0));
    assert!((res.metrics.peer_gap_pct.unwrap() - 50.0).abs() < 1e-9);

    assert_eq!(
        res.providers_used,
        vec!["nse", "finnhub", "alphavantage", "yahoo"]
    );
    assert_eq!(res.warnings, vec!["fmp: transport error: HTTP 429"]);
}

#[tokio::test]
async fn test_sequential_and_concurrent_agree() {
    let sequential = FundamentalsResolver::new(reversed_chain(), Duration::from_secs(2), 1)
        .resolve("ACME.NS", None)
        .await
        .unwrap();
    let concurrent = FundamentalsResolver::new(reversed_chain(), Duration::from_secs(2), 3)
        .resolve("ACME.NS", None)
        .await
        .unwrap();
    assert_eq!(sequential, concurrent);
}

#[tokio::test]
async fn test_sequential_early_exit_skips_remaining_adapters() {
    let finnhub = FakeAdapter::ok(AdapterKind::Metrics, "finnhub", metrics(30.0, 18.0, 0.5, 21.0));
    let fmp = FakeAdapter::ok(AdapterKind::Statements, "fmp", metrics(1.0, 1.0, 1.0, 1.0));
    let yahoo = FakeAdapter::ok(AdapterKind::PriceHistory, "yahoo", metrics(2.0, 2.0, 2.0, 2.0));
    let (fmp_calls, yahoo_calls) = (fmp.counter(), yahoo.counter());

    let resolver = FundamentalsResolver::new(
        vec![yahoo.boxed(), fmp.boxed(), finnhub.boxed()],
        Duration::from_secs(2),
        1,
    );
    let res = resolver.resolve("TSLA", None).await.unwrap();

    assert_eq!(res.metrics, metrics(30.0, 18.0, 0.5, 21.0));
    assert_eq!(res.providers_used, vec!["finnhub"]);
    assert_eq!(calls(&fmp_calls), 0);
    assert_eq!(calls(&yahoo_calls), 0);
}

#[tokio::test]
async fn test_concurrent_mode_times_out_slow_adapter() {
    let adapters = vec![
        FakeAdapter::ok(AdapterKind::Metrics, "finnhub", metrics(30.0, 18.0, 0.5, 21.0))
            .delayed(Duration::from_secs(5))
            .boxed(),
        FakeAdapter::ok(
            AdapterKind::PriceHistory,
            "yahoo",
            partial(Some(33.0), None, None, None),
        )
        .boxed(),
    ];
    let resolver = FundamentalsResolver::new(adapters, Duration::from_millis(100), 2);
    let res = resolver.resolve("TSLA", None).await.unwrap();

    assert_eq!(res.metrics.pe, Some(33.0));
    assert_eq!(res.warnings.len(), 1);
    assert!(res.warnings[0].starts_with("finnhub: transport error: timed out"));
    assert_eq!(res.providers_used, vec!["yahoo"]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_any_completion_order_matches_sequential(
        order in Just(vec![0u64, 1, 2, 3, 4]).prop_shuffle(),
        concurrency in 2usize..=5,
    ) {
        let delays = [order[0] * 15, order[1] * 15, order[2] * 15, order[3] * 15, order[4] * 15];
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let (sequential, concurrent) = rt.block_on(async {
            let sequential = FundamentalsResolver::new(chain_with_delays([0; 5]), Duration::from_secs(2), 1)
                .resolve("ACME.NS", Some(50.0))
                .await
                .unwrap();
            let concurrent =
                FundamentalsResolver::new(chain_with_delays(delays), Duration::from_secs(2), concurrency)
                    .resolve("ACME.NS", Some(50.0))
                    .await
                    .unwrap();
            (sequential, concurrent)
        });

        prop_assert_eq!(&concurrent, &sequential);
        prop_assert_eq!(concurrent.metrics.pe, Some(25.0));
    }
}
