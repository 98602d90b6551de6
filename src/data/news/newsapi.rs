//! NewsAPI everything-search feed.
//!
//! API: `https://newsapi.org/v2/everything`
//! Auth: API key via `apiKey` query param. Free tier: 100 req/day.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{status_error, NewsError, NewsFeed};
use crate::data::http_client;

const NEWSAPI_BASE_URL: &str = "https://newsapi.org";

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsArticle {
    #[serde(default)]
    title: Option<String>,
}

pub struct NewsApiFeed {
    http: Client,
    api_key: Option<SecretString>,
    language: String,
    page_size: usize,
    base_url: String,
}

impl NewsApiFeed {
    pub fn new(
        api_key: Option<SecretString>,
        language: &str,
        page_size: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Self::with_base_url(api_key, language, page_size, NEWSAPI_BASE_URL, timeout)
    }

    pub fn with_base_url(
        api_key: Option<SecretString>,
        language: &str,
        page_size: usize,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            api_key,
            language: language.to_string(),
            page_size,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl NewsFeed for NewsApiFeed {
    fn name(&self) -> &'static str {
        "newsapi"
    }

    async fn headlines(&self, query: &str) -> Result<Vec<String>, NewsError> {
        let key = self
            .api_key
            .as_ref()
            .ok_or(NewsError::MissingCredential("NewsAPI"))?;

        let page_size = self.page_size.to_string();
        let resp = self
            .http
            .get(format!("{}/v2/everything", self.base_url))
            .query(&[
                ("q", query),
                ("language", self.language.as_str()),
                ("pageSize", page_size.as_str()),
                ("sortBy", "publishedAt"),
                ("apiKey", key.expose_secret().as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let data: NewsApiResponse = resp.json().await?;
        if data.status == "error" {
            return Err(NewsError::Parse(
                data.message.unwrap_or_else(|| "NewsAPI returned status=error".into()),
            ));
        }
        debug!(query, articles = data.articles.len(), "NewsAPI response");
        Ok(data.articles.into_iter().filter_map(|a| a.title).collect())
    }
}
