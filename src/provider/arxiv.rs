//! arXiv API provider.
//!
//! Queries the arXiv Atom API (`/api/query`), newest submissions first, and
//! maps feed entries to [`Paper`] values. Pages are fetched one at a time with
//! a politeness delay between requests; each page is retried with exponential
//! backoff, and when a page finally fails the papers collected so far are
//! returned.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, error, info};

use super::{collapse_whitespace, PaperProvider, PaperQuery, ProviderError, ProviderResult, RetryPolicy};
use crate::config::FetchConfig;
use crate::models::Paper;

/// Atom feed root. Only the entries are of interest.
#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: String,
    title: String,
    #[serde(default)]
    summary: String,
    published: String,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
    #[serde(rename = "primary_category", alias = "arxiv:primary_category", default)]
    primary_category: Option<AtomCategory>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@title", default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: String,
}

impl AtomEntry {
    fn into_paper(self) -> ProviderResult<Paper> {
        let published = DateTime::parse_from_rfc3339(self.published.trim())
            .map_err(|e| {
                ProviderError::ParseError(format!(
                    "Invalid published timestamp '{}' for {}: {}",
                    self.published, self.id, e
                ))
            })?
            .with_timezone(&Utc);

        let url = self.id.trim().to_string();
        let id = url.rsplit('/').next().unwrap_or(url.as_str()).to_string();
        let pdf_url = self
            .links
            .iter()
            .find(|link| link.title.as_deref() == Some("pdf"))
            .map(|link| link.href.clone());

        Ok(Paper {
            id,
            title: collapse_whitespace(&self.title),
            authors: self
                .authors
                .into_iter()
                .map(|author| collapse_whitespace(&author.name))
                .collect(),
            abstract_text: collapse_whitespace(&self.summary),
            url,
            pdf_url,
            published,
            categories: self.categories.into_iter().map(|c| c.term).collect(),
            primary_category: self.primary_category.map(|c| c.term),
            matched_topic: None,
        })
    }
}

/// Parse an arXiv Atom feed into papers, in feed order.
///
/// arXiv reports bad queries as a feed holding a single entry whose id points
/// at `/api/errors`; that is surfaced as [`ProviderError::ApiError`].
pub fn parse_feed(xml: &str) -> ProviderResult<Vec<Paper>> {
    let feed: AtomFeed = quick_xml::de::from_str(xml)
        .map_err(|e| ProviderError::ParseError(format!("Invalid Atom feed: {}", e)))?;

    if let Some(entry) = feed.entries.iter().find(|e| e.id.contains("/api/errors")) {
        return Err(ProviderError::ApiError(collapse_whitespace(&entry.summary)));
    }

    feed.entries.into_iter().map(AtomEntry::into_paper).collect()
}

/// Paper provider backed by the arXiv API.
#[derive(Debug, Clone)]
pub struct ArxivProvider {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
    page_size: usize,
    request_delay: Duration,
    retry: RetryPolicy,
}

impl ArxivProvider {
    /// Build a provider from the fetch section of the configuration.
    ///
    /// # Errors
    /// Returns `ProviderError::ConfigError` for unusable durations or if the
    /// HTTP client cannot be built
    pub fn from_config(config: &FetchConfig) -> ProviderResult<Self> {
        let seconds = |value: f64, field: &str| {
            Duration::try_from_secs_f64(value)
                .map_err(|e| ProviderError::ConfigError(format!("fetch.{}: {}", field, e)))
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("paper-digest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            max_results: config.max_results,
            page_size: config.page_size.max(1),
            request_delay: seconds(config.request_delay_secs, "request_delay_secs")?,
            retry: RetryPolicy::new(
                config.max_retries,
                seconds(config.retry_base_delay_secs, "retry_base_delay_secs")?,
            ),
        })
    }

    async fn fetch_page(&self, query: &str, start: usize, count: usize) -> ProviderResult<Vec<Paper>> {
        let params = [
            ("search_query", query.to_string()),
            ("start", start.to_string()),
            ("max_results", count.to_string()),
            ("sortBy", "submittedDate".to_string()),
            ("sortOrder", "descending".to_string()),
        ];

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimitExceeded(format!(
                "arXiv answered {} for start={}",
                status, start
            )));
        }
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        parse_feed(&body)
    }
}

#[async_trait]
impl PaperProvider for ArxivProvider {
    async fn fetch_papers(&self, query: &PaperQuery) -> ProviderResult<Vec<Paper>> {
        info!("Fetching papers for query: {}", query.query);

        let mut papers = Vec::new();
        let mut start = 0;

        while start < self.max_results {
            if start > 0 {
                tokio::time::sleep(self.request_delay).await;
            }

            let count = self.page_size.min(self.max_results - start);
            let label = format!("'{}' (start={})", query.query, start);
            let search = query.query.as_str();
            let page = match self
                .retry
                .run(&label, move || self.fetch_page(search, start, count))
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    error!("{}. Returning {} partial results.", e, papers.len());
                    break;
                }
            };

            let page_len = page.len();
            // Results are newest first, so once a page reaches past the cutoff
            // later pages cannot contribute.
            let reached_cutoff = match (query.cutoff, page.last()) {
                (Some(cutoff), Some(oldest)) => oldest.published < cutoff,
                _ => false,
            };

            papers.extend(page.into_iter().filter(|paper| query.matches(paper)));
            debug!("Page at start={} returned {} entries", start, page_len);

            if page_len < count || reached_cutoff {
                break;
            }
            start += page_len;
        }

        info!("Fetched {} papers", papers.len());
        Ok(papers)
    }

    fn name(&self) -> &str {
        "arXiv"
    }
}
