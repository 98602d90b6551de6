//! Fundamentals resolver.
//!
//! Drives the source adapters in fixed priority order and folds their
//! partial records into one [`MetricsRecord`]. A field, once set, is never
//! overwritten by a lower-priority source. Adapter failures are recorded as
//! warnings and never abort the chain.
//!
//! Two execution modes, selected by `max_concurrency`:
//! - `1`: strictly sequential, stopping as soon as every core field is set.
//! - `>1`: adapters run concurrently via `buffer_unordered`; results are
//!   re-sorted by priority before merging, so completion order never
//!   affects the outcome.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, FundamentalsConfig};
use crate::data::alphavantage::AlphaVantageAdapter;
use crate::data::finnhub::FinnhubAdapter;
use crate::data::fmp::FmpAdapter;
use crate::data::nse::NseAdapter;
use crate::data::yahoo::YahooAdapter;
use crate::data::{AdapterError, SourceAdapter, SourceResult};
use crate::types::MetricsRecord;

/// Merged fundamentals plus a record of how they were obtained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub metrics: MetricsRecord,
    /// One `"<adapter>: <error>"` entry per failed adapter, in priority
    /// order.
    pub warnings: Vec<String>,
    /// Adapters that filled at least one field, in priority order.
    pub providers_used: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("empty symbol")]
    EmptySymbol,
}

pub struct FundamentalsResolver {
    /// Sorted by priority.
    adapters: Vec<Box<dyn SourceAdapter>>,
    timeout: Duration,
    max_concurrency: usize,
}

impl FundamentalsResolver {
    pub fn new(
        mut adapters: Vec<Box<dyn SourceAdapter>>,
        timeout: Duration,
        max_concurrency: usize,
    ) -> Self {
        adapters.sort_by_key(|a| a.kind().priority());
        Self {
            adapters,
            timeout,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// The production chain: NSE, Finnhub, FMP, Alpha Vantage, Yahoo.
    /// Keys come from the environment; a missing key leaves the adapter in
    /// place and it reports itself unavailable on use.
    pub fn from_config(cfg: &FundamentalsConfig) -> Result<Self> {
        let timeout = cfg.timeout();
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![
            Box::new(NseAdapter::new(timeout)?),
            Box::new(FinnhubAdapter::new(
                AppConfig::secret_from_env(&cfg.finnhub_key_env),
                timeout,
            )?),
            Box::new(FmpAdapter::new(
                AppConfig::secret_from_env(&cfg.fmp_key_env),
                timeout,
            )?),
            Box::new(AlphaVantageAdapter::new(
                AppConfig::secret_from_env(&cfg.alphavantage_key_env),
                timeout,
            )?),
            Box::new(YahooAdapter::new(timeout)?),
        ];
        Ok(Self::new(adapters, timeout, cfg.max_concurrency))
    }

    pub fn adapter_names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Resolve fundamentals for `symbol`. A caller-supplied `peer_pe`
    /// seeds the record and outranks every adapter.
    pub async fn resolve(
        &self,
        symbol: &str,
        peer_pe: Option<f64>,
    ) -> Result<Resolution, ResolveError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(ResolveError::EmptySymbol);
        }

        let mut acc = MetricsRecord {
            peer_pe,
            ..Default::default()
        };
        let mut out = Resolution::default();

        let applicable: Vec<&dyn SourceAdapter> = self
            .adapters
            .iter()
            .map(|a| a.as_ref())
            .filter(|a| {
                let ok = a.supports(symbol);
                if !ok {
                    debug!(adapter = a.name(), symbol, "Adapter does not apply, skipped");
                }
                ok
            })
            .collect();

        if self.max_concurrency == 1 {
            for adapter in applicable {
                if acc.is_core_complete() {
                    debug!(symbol, "Core fields complete, stopping chain");
                    break;
                }
                let outcome = self.invoke(adapter, symbol).await;
                Self::absorb(&mut acc, &mut out, adapter.name(), outcome);
            }
        } else {
            let mut outcomes: Vec<(usize, &'static str, SourceResult)> = stream::iter(
                applicable.into_iter().enumerate(),
            )
            .map(|(rank, adapter)| async move {
                (rank, adapter.name(), self.invoke(adapter, symbol).await)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

            // Merge order, not completion order, decides values.
            outcomes.sort_by_key(|(rank, _, _)| *rank);
            for (_, name, outcome) in outcomes {
                if acc.is_core_complete() {
                    debug!(symbol, "Core fields complete, ignoring remaining results");
                    break;
                }
                Self::absorb(&mut acc, &mut out, name, outcome);
            }
        }

        acc.derive_peer_gap();
        out.metrics = acc;

        info!(
            symbol,
            providers = ?out.providers_used,
            failures = out.warnings.len(),
            metrics = %out.metrics,
            "Fundamentals resolved"
        );
        Ok(out)
    }

    async fn invoke(&self, adapter: &dyn SourceAdapter, symbol: &str) -> SourceResult {
        match tokio::time::timeout(self.timeout, adapter.fetch(symbol)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AdapterError::Transport(format!(
                "timed out after {:?}",
                self.timeout
            ))),
        }
    }

    fn absorb(acc: &mut MetricsRecord, out: &mut Resolution, name: &str, outcome: SourceResult) {
        match outcome {
            Ok(hit) => {
                let filled = acc.fill_missing(&hit.metrics);
                debug!(adapter = name, filled, "Adapter result merged");
                if filled > 0 {
                    out.providers_used.push(name.to_string());
                }
            }
            Err(e) => {
                warn!(adapter = name, error = %e, "Fundamentals adapter failed");
                out.warnings.push(format!("{name}: {e}"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
