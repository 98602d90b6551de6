//! GNews search feed.
//!
//! API: `https://gnews.io/api/v4/search`
//! Auth: API key via `token` query param. Free tier: 100 req/day.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{status_error, NewsError, NewsFeed};
use crate::data::http_client;

const GNEWS_BASE_URL: &str = "https://gnews.io";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: Option<String>,
}

pub struct GnewsFeed {
    http: Client,
    api_key: Option<SecretString>,
    language: String,
    max: usize,
    base_url: String,
}

impl GnewsFeed {
    pub fn new(
        api_key: Option<SecretString>,
        language: &str,
        max: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Self::with_base_url(api_key, language, max, GNEWS_BASE_URL, timeout)
    }

    pub fn with_base_url(
        api_key: Option<SecretString>,
        language: &str,
        max: usize,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            api_key,
            language: language.to_string(),
            max,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl NewsFeed for GnewsFeed {
    fn name(&self) -> &'static str {
        "gnews"
    }

    async fn headlines(&self, query: &str) -> Result<Vec<String>, NewsError> {
        let key = self
            .api_key
            .as_ref()
            .ok_or(NewsError::MissingCredential("GNews"))?;

        let max = self.max.to_string();
        let resp = self
            .http
            .get(format!("{}/api/v4/search", self.base_url))
            .query(&[
                ("q", query),
                ("lang", self.language.as_str()),
                ("max", max.as_str()),
                ("token", key.expose_secret().as_str()),
                ("sortby", "publishedAt"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let body: SearchResponse = resp.json().await?;
        debug!(query, articles = body.articles.len(), "GNews response");
        Ok(body.articles.into_iter().filter_map(|a| a.title).collect())
    }
}
