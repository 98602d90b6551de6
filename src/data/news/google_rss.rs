//! Google News RSS search feed. No credential required.
//!
//! URL: `https://news.google.com/rss/search?q=<query>&hl=<lang>`

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{status_error, NewsError, NewsFeed};
use crate::data::http_client;

const GOOGLE_NEWS_BASE_URL: &str = "https://news.google.com";

pub struct GoogleRssFeed {
    http: Client,
    language: String,
    limit: usize,
    base_url: String,
}

impl GoogleRssFeed {
    pub fn new(language: &str, limit: usize, timeout: Duration) -> Result<Self> {
        Self::with_base_url(language, limit, GOOGLE_NEWS_BASE_URL, timeout)
    }

    pub fn with_base_url(
        language: &str,
        limit: usize,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            language: language.to_string(),
            limit,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn parse_channel(content: &[u8], limit: usize) -> Result<Vec<String>, NewsError> {
        let channel =
            rss::Channel::read_from(content).map_err(|e| NewsError::Parse(e.to_string()))?;
        Ok(channel
            .items()
            .iter()
            .take(limit)
            .filter_map(|item| item.title().map(str::to_string))
            .collect())
    }
}

#[async_trait]
impl NewsFeed for GoogleRssFeed {
    fn name(&self) -> &'static str {
        "google_rss"
    }

    async fn headlines(&self, query: &str) -> Result<Vec<String>, NewsError> {
        let url = format!(
            "{}/rss/search?q={}&hl={}",
            self.base_url,
            urlencoding::encode(query),
            urlencoding::encode(&self.language)
        );
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let content = resp.bytes().await?;
        let titles = Self::parse_channel(&content[..], self.limit)?;
        debug!(query, items = titles.len(), "Google News RSS parsed");
        Ok(titles)
    }
}
