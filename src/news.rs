//! News articles from NewsAPI, with a small on-disk cache.
//!
//! Results are keyed by query and page size and reused for a day by
//! default, so repeated ingests do not burn API quota.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Errors that can occur fetching news.
#[derive(Debug, thiserror::Error)]
pub(crate) enum NewsError {
    #[error("NEWS_API_KEY environment variable is not set")]
    MissingApiKey,

    /// The API answered with `"status": "error"`.
    #[error("NewsAPI error ({code}): {message}")]
    Api { code: String, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cache error: {0}")]
    Cache(#[from] std::io::Error),
}

/// A news article as returned by `/v2/everything`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Article {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "urlToImage")]
    pub image_url: Option<String>,
    #[serde(default, rename = "publishedAt")]
    pub published_at: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub source: Option<ArticleSource>,
}

impl Article {
    pub fn source_name(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.name.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ArticleSource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EverythingResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

/// Client for the NewsAPI `/v2/everything` endpoint.
#[derive(Debug, Clone)]
pub(crate) struct NewsClient {
    base_url: String,
    http: reqwest::Client,
}

impl NewsClient {
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, NewsError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("proofrun/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Fetch English articles matching `query`.
    pub async fn fetch(
        &self,
        api_key: &str,
        query: &str,
        page_size: u32,
    ) -> Result<Vec<Article>, NewsError> {
        if api_key.trim().is_empty() {
            return Err(NewsError::MissingApiKey);
        }

        let url = format!("{}/v2/everything", self.base_url);
        let page_size = page_size.to_string();
        debug!("GET {} q={} pageSize={}", url, query, page_size);

        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", api_key)
            .query(&[
                ("q", query),
                ("language", "en"),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await?;
        let text = response.text().await?;
        let body: EverythingResponse = serde_json::from_str(&text)?;

        if body.status != "ok" {
            return Err(NewsError::Api {
                code: body.code.unwrap_or_else(|| "unknown".to_string()),
                message: body.message.unwrap_or(text),
            });
        }

        info!("Fetched {} articles for '{}'", body.articles.len(), query);
        Ok(body.articles)
    }

    /// Like [`fetch`](Self::fetch), but served from `cache` when a fresh
    /// entry exists. `refresh` forces a request.
    pub async fn fetch_cached(
        &self,
        api_key: &str,
        query: &str,
        page_size: u32,
        cache: &NewsCache,
        refresh: bool,
    ) -> Result<Vec<Article>, NewsError> {
        if api_key.trim().is_empty() {
            return Err(NewsError::MissingApiKey);
        }

        if !refresh {
            if let Some(articles) = cache.load(query, page_size) {
                info!("Using {} cached articles for '{}'", articles.len(), query);
                return Ok(articles);
            }
        }

        let articles = self.fetch(api_key, query, page_size).await?;
        if let Err(e) = cache.store(query, page_size, &articles) {
            warn!(
                "Failed to cache news results in {}: {}",
                cache.dir().display(),
                e
            );
        }
        Ok(articles)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    fetched_at: DateTime<Utc>,
    query: String,
    page_size: u32,
    articles: Vec<Article>,
}

/// A century; keeps the ttl inside chrono's range.
const MAX_TTL_HOURS: u64 = 876_000;

/// Query-keyed article cache with expiry.
#[derive(Debug, Clone)]
pub(crate) struct NewsCache {
    dir: PathBuf,
    ttl: Duration,
}

impl NewsCache {
    pub fn new(dir: impl Into<PathBuf>, ttl_hours: u64) -> Self {
        Self {
            dir: dir.into(),
            ttl: Duration::hours(i64::try_from(ttl_hours.min(MAX_TTL_HOURS)).unwrap_or(0)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, query: &str, page_size: u32) -> PathBuf {
        self.dir
            .join(format!("news-{}-{}.json", slugify(query), page_size))
    }

    /// Cached articles, if present, readable and younger than the ttl.
    pub fn load(&self, query: &str, page_size: u32) -> Option<Vec<Article>> {
        self.load_at(query, page_size, Utc::now())
    }

    fn load_at(&self, query: &str, page_size: u32, now: DateTime<Utc>) -> Option<Vec<Article>> {
        let path = self.path_for(query, page_size);
        let content = fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                return None;
            }
        };

        if entry.query != query || entry.page_size != page_size {
            return None;
        }
        if now.signed_duration_since(entry.fetched_at) >= self.ttl {
            debug!("Cache entry {} expired", path.display());
            return None;
        }
        Some(entry.articles)
    }

    pub fn store(&self, query: &str, page_size: u32, articles: &[Article]) -> Result<(), NewsError> {
        self.store_at(query, page_size, articles, Utc::now())
    }

    fn store_at(
        &self,
        query: &str,
        page_size: u32,
        articles: &[Article],
        fetched_at: DateTime<Utc>,
    ) -> Result<(), NewsError> {
        fs::create_dir_all(&self.dir)?;
        let entry = CacheEntry {
            fetched_at,
            query: query.to_string(),
            page_size,
            articles: articles.to_vec(),
        };
        fs::write(
            self.path_for(query, page_size),
            serde_json::to_string_pretty(&entry)?,
        )?;
        Ok(())
    }
}

/// Lowercase ASCII slug: runs of anything non-alphanumeric become one `-`.
pub(crate) fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "all".to_string()
    } else {
        slug.to_string()
    }
}
