//! Deterministic collaborators for integration testing.
//!
//! Fake adapters return a fixed record or error after an optional delay
//! and count their invocations; the fake news source returns a fixed list
//! regardless of the live switch. Nothing here touches the network.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ipobot::data::news::{NewsError, NewsSource};
use ipobot::data::{AdapterError, AdapterKind, SourceAdapter, SourceHit, SourceResult};
use ipobot::types::{MetricsRecord, NewsItem};

/// A fundamentals provider with a scripted outcome.
pub struct FakeAdapter {
    kind: AdapterKind,
    name: &'static str,
    outcome: Result<MetricsRecord, AdapterError>,
    delay: Duration,
    ns_only: bool,
    calls: Arc<AtomicUsize>,
}

impl FakeAdapter {
    pub fn ok(kind: AdapterKind, name: &'static str, metrics: MetricsRecord) -> Self {
        Self::scripted(kind, name, Ok(metrics))
    }

    pub fn failing(kind: AdapterKind, name: &'static str, error: AdapterError) -> Self {
        Self::scripted(kind, name, Err(error))
    }

    fn scripted(
        kind: AdapterKind,
        name: &'static str,
        outcome: Result<MetricsRecord, AdapterError>,
    ) -> Self {
        Self {
            kind,
            name,
            outcome,
            delay: Duration::ZERO,
            ns_only: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep this long before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Only claim `.NS` symbols, like the exchange adapter.
    pub fn ns_only(mut self) -> Self {
        self.ns_only = true;
        self
    }

    /// Shared handle to the invocation counter.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn boxed(self) -> Box<dyn SourceAdapter> {
        Box::new(self)
    }
}

#[async_trait]
impl SourceAdapter for FakeAdapter {
    fn kind(&self) -> AdapterKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, symbol: &str) -> bool {
        !self.ns_only || symbol.ends_with(".NS")
    }

    async fn fetch(&self, _symbol: &str) -> SourceResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.outcome {
            Ok(metrics) => SourceHit::from_metrics(self.kind, *metrics),
            Err(e) => Err(e.clone()),
        }
    }
}

/// News source with a fixed answer.
pub struct FixedNews {
    items: Vec<NewsItem>,
}

impl FixedNews {
    pub fn new(items: Vec<NewsItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl NewsSource for FixedNews {
    fn provider_name(&self) -> &str {
        "fixed"
    }

    async fn fetch(&self, _query: &str, _live: bool) -> Result<Vec<NewsItem>, NewsError> {
        Ok(self.items.clone())
    }
}

pub fn metrics(pe: f64, roe_pct: f64, debt_to_equity: f64, revenue_cagr_pct: f64) -> MetricsRecord {
    MetricsRecord {
        pe: Some(pe),
        roe_pct: Some(roe_pct),
        debt_to_equity: Some(debt_to_equity),
        revenue_cagr_pct: Some(revenue_cagr_pct),
        ..Default::default()
    }
}

pub fn calls(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}
