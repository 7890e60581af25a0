//! Paper provider module.
//!
//! This module defines the interface for sourcing paper metadata and includes
//! the arXiv API client and a JSON file source for offline runs.
//!
//! Providers return papers in catalog order. They do not deduplicate across
//! queries; the digest generator does that when it merges topics.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::models::Paper;

pub mod arxiv;
pub mod json;

/// Errors that can occur when fetching papers from a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to read from the data source
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the data format
    #[error("Parse error: {0}")]
    ParseError(String),

    /// API rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Network or connection error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Non-success HTTP status
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// The catalog answered with an error document
    #[error("API error: {0}")]
    ApiError(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Every attempt failed
    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::NetworkError(_) | ProviderError::RateLimitExceeded(_) => true,
            ProviderError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// What to fetch: a catalog query plus client-side filters.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperQuery {
    /// Catalog search expression (e.g. `cat:cs.RO AND grasping`)
    pub query: String,

    /// Keep only papers tagged with at least one of these categories.
    /// Empty means no category filter.
    pub categories: Vec<String>,

    /// Drop papers published before this instant
    pub cutoff: Option<DateTime<Utc>>,
}

impl PaperQuery {
    /// Create a query with no category filter and no cutoff.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            categories: Vec::new(),
            cutoff: None,
        }
    }

    /// Restrict results to the given categories.
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    /// Drop papers published before `cutoff`.
    pub fn with_cutoff(mut self, cutoff: DateTime<Utc>) -> Self {
        self.cutoff = Some(cutoff);
        self
    }

    /// Whether a paper passes the cutoff and category filters.
    pub fn matches(&self, paper: &Paper) -> bool {
        if let Some(cutoff) = self.cutoff {
            if paper.published < cutoff {
                return false;
            }
        }

        self.categories.is_empty()
            || paper
                .categories
                .iter()
                .any(|category| self.categories.contains(category))
    }
}

/// Trait for sourcing paper metadata.
///
/// Implementations handle their own pagination, rate limiting and retries.
/// A provider that runs out of retries should hand back whatever it collected
/// rather than fail the whole fetch.
#[async_trait]
pub trait PaperProvider: Send + Sync {
    /// Fetch the papers matching `query`, already filtered by its cutoff and
    /// categories.
    async fn fetch_papers(&self, query: &PaperQuery) -> ProviderResult<Vec<Paper>>;

    /// Human-readable name of this provider, for logging.
    fn name(&self) -> &str;
}

/// Bounded retry with exponential backoff.
///
/// After the n-th failed attempt the caller waits `base_delay * 2^n` before
/// trying again, until `max_attempts` attempts have been made.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub max_attempts: u32,

    /// Delay unit for the backoff
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a retry policy.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Backoff to wait after `failures` failed attempts.
    pub fn delay_for(&self, failures: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(failures))
    }

    /// Run `operation` until it succeeds, fails with a permanent error, or
    /// the attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut failures = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    failures += 1;
                    warn!(
                        "Error fetching {} (attempt {}/{}): {}",
                        label, failures, max_attempts, e
                    );

                    if failures >= max_attempts {
                        error!("Max retries reached for {}", label);
                        return Err(ProviderError::RetriesExhausted {
                            attempts: failures,
                            last_error: e.to_string(),
                        });
                    }

                    let wait = self.delay_for(failures);
                    info!("Retrying in {:?}...", wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

/// Collapse runs of whitespace (including newlines) into single spaces.
///
/// Catalog titles and abstracts are hard-wrapped; this makes them single-line.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
