//! Digest configuration.
//!
//! The configuration is a TOML file (by default `config/topics.toml`) holding
//! the research interests, the topics to fetch, and the ranking, fetch and
//! output settings. Everything except the interests and topics has defaults.
//!
//! ```toml
//! research_interests = "Robot manipulation, grasping and 3D perception."
//!
//! [[topics]]
//! name = "Robotics Manipulation"
//! query = "cat:cs.RO AND (manipulation OR grasping)"
//! categories = ["cs.RO", "cs.CV"]
//! keywords = ["grasping", "manipulation"]
//!
//! [ranking]
//! min_relevance_threshold = 0.3
//! top_n_papers = 10
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ranking::RankingRequest;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A value is out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A topic to fetch papers for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicConfig {
    /// Display name, attached to the papers this topic surfaces
    pub name: String,

    /// Catalog search expression
    pub query: String,

    /// Optional category filter
    #[serde(default)]
    pub categories: Vec<String>,

    /// Keywords that earn a title-match bonus
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Ranking parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingConfig {
    pub min_relevance_threshold: f64,
    /// Zero or negative yields an empty digest
    pub top_n_papers: i64,
    pub keyword_bonus: f64,
    pub recency_weight: f64,
    /// Skip papers already recorded in the read-log
    pub filter_read: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_relevance_threshold: 0.3,
            top_n_papers: 10,
            keyword_bonus: 0.05,
            recency_weight: 0.1,
            filter_read: true,
        }
    }
}

/// Paper source settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// Only papers published within this many days are kept
    pub days_back: u32,
    /// Maximum results requested per topic
    pub max_results: usize,
    /// Results requested per API call
    pub page_size: usize,
    /// Attempts per request before giving up
    pub max_retries: u32,
    /// Backoff unit; the n-th retry waits `retry_base_delay_secs * 2^n`
    pub retry_base_delay_secs: f64,
    /// Pause between consecutive API calls
    pub request_delay_secs: f64,
    /// Per-request HTTP timeout
    pub timeout_secs: u64,
    pub base_url: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            days_back: 7,
            max_results: 100,
            page_size: 100,
            max_retries: 3,
            retry_base_delay_secs: 1.0,
            request_delay_secs: 3.0,
            timeout_secs: 30,
            base_url: "http://export.arxiv.org/api/query".to_string(),
        }
    }
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory the digest files are written to
    pub dir: PathBuf,
    /// Read-log of previously surfaced paper ids
    pub read_log: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            read_log: PathBuf::from("data/read_papers.json"),
        }
    }
}

/// Embedding model settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Model name, e.g. `all-MiniLM-L6-v2`
    pub model: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: crate::DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

/// Complete digest configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DigestConfig {
    /// Free-text description the papers are ranked against
    #[serde(default)]
    pub research_interests: String,

    #[serde(default)]
    pub topics: Vec<TopicConfig>,

    #[serde(default)]
    pub ranking: RankingConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub embedding: EmbeddingSettings,
}

impl DigestConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: DigestConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: DigestConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> ConfigResult<()> {
        let ranking = &self.ranking;
        let non_negative = [
            ("ranking.keyword_bonus", ranking.keyword_bonus),
            ("ranking.recency_weight", ranking.recency_weight),
            ("fetch.retry_base_delay_secs", self.fetch.retry_base_delay_secs),
            ("fetch.request_delay_secs", self.fetch.request_delay_secs),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a non-negative number, got {}",
                    field, value
                )));
            }
        }

        if !ranking.min_relevance_threshold.is_finite() {
            return Err(ConfigError::Invalid(
                "ranking.min_relevance_threshold must be a finite number".into(),
            ));
        }

        if self.fetch.max_results == 0 {
            return Err(ConfigError::Invalid(
                "fetch.max_results must be greater than 0".into(),
            ));
        }

        if self.fetch.page_size == 0 {
            return Err(ConfigError::Invalid(
                "fetch.page_size must be greater than 0".into(),
            ));
        }

        let mut names = HashSet::new();
        for (index, topic) in self.topics.iter().enumerate() {
            if topic.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "topics[{}].name must not be empty",
                    index
                )));
            }
            if topic.query.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "topic '{}' has an empty query",
                    topic.name
                )));
            }
            if topic.keywords.iter().any(|keyword| keyword.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "topic '{}' has a blank keyword",
                    topic.name
                )));
            }
            if !names.insert(topic.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate topic name '{}'",
                    topic.name
                )));
            }
        }

        Ok(())
    }

    /// Keywords of every topic, in topic order.
    pub fn all_keywords(&self) -> Vec<String> {
        self.topics
            .iter()
            .flat_map(|topic| topic.keywords.iter().cloned())
            .collect()
    }

    /// Ranking request derived from the ranking section and topic keywords.
    pub fn ranking_request(&self) -> RankingRequest {
        RankingRequest {
            keywords: self.all_keywords(),
            min_threshold: self.ranking.min_relevance_threshold,
            top_n: usize::try_from(self.ranking.top_n_papers).unwrap_or(0),
            keyword_bonus: self.ranking.keyword_bonus,
            recency_weight: self.ranking.recency_weight,
            filter_read: self.ranking.filter_read,
            read_log: self.output.read_log.clone(),
        }
    }
}
