//! Headline providers and the fallback chain in front of them.
//!
//! A [`NewsChain`] asks the configured primary feed first and falls back
//! to the credential-free Google News RSS feed whenever the primary yields
//! nothing usable. The RSS leg never comes back empty: with no entries it
//! produces a single neutral placeholder, so downstream sentiment always
//! has something to look at.
//!
//! Every headline is labelled at fetch time by the keyword classifier in
//! [`crate::sentiment::rules`].

pub mod gnews;
pub mod google_rss;
pub mod newsapi;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, NewsConfig};
use crate::sentiment::rules::classify_headline;
use crate::types::{NewsItem, SentimentLabel};

pub use gnews::GnewsFeed;
pub use google_rss::GoogleRssFeed;
pub use newsapi::NewsApiFeed;

// ---------------------------------------------------------------------------
// Provider selection
// ---------------------------------------------------------------------------

/// Closed set of primary headline providers. Parsed from `news.provider`
/// at config load; unknown names never reach a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsProviderKind {
    Gnews,
    Newsapi,
    GoogleRss,
}

impl NewsProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsProviderKind::Gnews => "gnews",
            NewsProviderKind::Newsapi => "newsapi",
            NewsProviderKind::GoogleRss => "google_rss",
        }
    }
}

impl fmt::Display for NewsProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NewsProviderKind {
    type Err = NewsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gnews" => Ok(NewsProviderKind::Gnews),
            "newsapi" => Ok(NewsProviderKind::Newsapi),
            "google_rss" => Ok(NewsProviderKind::GoogleRss),
            other => Err(NewsError::UnknownProvider(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NewsError {
    #[error("{0} API key not configured")]
    MissingCredential(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("no articles returned")]
    NoArticles,
    #[error("unknown news provider '{0}'")]
    UnknownProvider(String),
}

impl From<reqwest::Error> for NewsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            NewsError::Parse(e.to_string())
        } else {
            NewsError::Transport(e.to_string())
        }
    }
}

/// Turn a non-2xx response into [`NewsError::Status`], keeping a short
/// excerpt of the body for the log.
pub(crate) async fn status_error(resp: reqwest::Response) -> NewsError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(150).collect();
    NewsError::Status {
        status,
        body: excerpt.replace('\n', " "),
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// One upstream headline provider. Returns raw titles; cleaning and
/// labelling happen in the chain.
#[async_trait]
pub trait NewsFeed: Send + Sync {
    fn name(&self) -> &'static str;

    async fn headlines(&self, query: &str) -> Result<Vec<String>, NewsError>;
}

/// Labelled headlines for a query. The pipeline depends on this rather
/// than on [`NewsChain`] directly.
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Configured primary provider, reported in the result metadata.
    fn provider_name(&self) -> &str;

    /// `live = false` returns the canned sample without touching the
    /// network.
    async fn fetch(&self, query: &str, live: bool) -> Result<Vec<NewsItem>, NewsError>;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SAMPLE_HEADLINES: [(&str, SentimentLabel); 5] = [
    ("solid subscription numbers reported", SentimentLabel::Positive),
    ("robust order book; margin guidance intact", SentimentLabel::Positive),
    ("SEBI query on related-party disclosure", SentimentLabel::Negative),
    ("grey market premium steady", SentimentLabel::Positive),
    ("analyst flags valuation stretch", SentimentLabel::Negative),
];

/// Offline sample used when live news is switched off. Labels are fixed;
/// the query only prefixes the titles.
pub fn sample_headlines(query: &str) -> Vec<NewsItem> {
    SAMPLE_HEADLINES
        .iter()
        .map(|(h, sentiment)| NewsItem::new(format!("{query}: {h}"), *sentiment))
        .collect()
}

/// Unescape HTML entities, trim, drop blanks and cap the list.
pub fn clean_titles<I>(raw: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    raw.into_iter()
        .map(|t| html_escape::decode_html_entities(&t).trim().to_string())
        .filter(|t| !t.is_empty())
        .take(limit)
        .collect()
}

fn label(title: String) -> NewsItem {
    let sentiment = classify_headline(&title);
    NewsItem { title, sentiment }
}

fn placeholder(query: &str) -> NewsItem {
    NewsItem::new(
        format!("{query}: no recent articles (RSS)"),
        SentimentLabel::Neutral,
    )
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Primary feed with Google News RSS behind it.
pub struct NewsChain {
    kind: NewsProviderKind,
    /// `None` when the configured primary is the RSS feed itself.
    primary: Option<Box<dyn NewsFeed>>,
    secondary: Box<dyn NewsFeed>,
    page_size: usize,
    timeout: Duration,
}

impl NewsChain {
    pub fn new(
        kind: NewsProviderKind,
        primary: Option<Box<dyn NewsFeed>>,
        secondary: Box<dyn NewsFeed>,
        page_size: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            kind,
            primary,
            secondary,
            page_size,
            timeout,
        }
    }

    /// Build the production chain. The primary's API key is read from the
    /// environment variable named in the config; a missing key is not an
    /// error here, the feed reports it on first use and the chain falls
    /// back.
    pub fn from_config(cfg: &NewsConfig) -> Result<Self> {
        let timeout = cfg.timeout();
        let key = AppConfig::secret_from_env(&cfg.api_key_env);

        let primary: Option<Box<dyn NewsFeed>> = match cfg.provider {
            NewsProviderKind::Gnews => Some(Box::new(GnewsFeed::new(
                key,
                &cfg.language,
                cfg.page_size,
                timeout,
            )?)),
            NewsProviderKind::Newsapi => Some(Box::new(NewsApiFeed::new(
                key,
                &cfg.language,
                cfg.page_size,
                timeout,
            )?)),
            NewsProviderKind::GoogleRss => None,
        };
        let secondary = Box::new(GoogleRssFeed::new(&cfg.language, cfg.page_size, timeout)?);

        Ok(Self::new(cfg.provider, primary, secondary, cfg.page_size, timeout))
    }

    async fn bounded(&self, feed: &dyn NewsFeed, query: &str) -> Result<Vec<String>, NewsError> {
        let raw = tokio::time::timeout(self.timeout, feed.headlines(query))
            .await
            .map_err(|_| NewsError::Transport(format!("timed out after {:?}", self.timeout)))??;
        let titles = clean_titles(raw, self.page_size);
        if titles.is_empty() {
            return Err(NewsError::NoArticles);
        }
        Ok(titles)
    }

    async fn live(&self, query: &str) -> Vec<NewsItem> {
        if let Some(primary) = &self.primary {
            match self.bounded(primary.as_ref(), query).await {
                Ok(titles) => {
                    info!(provider = primary.name(), count = titles.len(), "Headlines fetched");
                    return titles.into_iter().map(label).collect();
                }
                Err(e) => {
                    warn!(provider = primary.name(), error = %e, "Primary news feed failed, falling back to RSS");
                }
            }
        }

        match self.bounded(self.secondary.as_ref(), query).await {
            Ok(titles) => {
                info!(provider = self.secondary.name(), count = titles.len(), "Headlines fetched");
                titles.into_iter().map(label).collect()
            }
            Err(e) => {
                warn!(provider = self.secondary.name(), error = %e, "RSS feed empty, using placeholder");
                vec![placeholder(query)]
            }
        }
    }
}

#[async_trait]
impl NewsSource for NewsChain {
    fn provider_name(&self) -> &str {
        self.kind.as_str()
    }

    async fn fetch(&self, query: &str, live: bool) -> Result<Vec<NewsItem>, NewsError> {
        if !live {
            debug!(query, "Live news disabled, using sample headlines");
            return Ok(sample_headlines(query));
        }
        Ok(self.live(query).await)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
