//! Core data models for the paper digest system.
//!
//! This module contains the data structures that flow through a digest run:
//! the immutable paper metadata produced by a source, and the scored view of a
//! paper produced by the ranking pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a single research paper as delivered by a paper source.
///
/// A `Paper` is never mutated once created. The ranking pipeline wraps it in a
/// [`ScoredPaper`] instead of writing scores back into it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paper {
    /// Stable catalog identifier (e.g. `2301.00001v1`), used for read tracking
    pub id: String,

    /// Paper title
    pub title: String,

    /// Author names in catalog order
    #[serde(default)]
    pub authors: Vec<String>,

    /// Abstract text
    #[serde(rename = "abstract")]
    pub abstract_text: String,

    /// Landing page URL
    #[serde(default)]
    pub url: String,

    /// Direct PDF link, when the catalog provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,

    /// Publication timestamp
    pub published: DateTime<Utc>,

    /// Category tags in catalog order
    #[serde(default)]
    pub categories: Vec<String>,

    /// Primary category, when the catalog distinguishes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_category: Option<String>,

    /// Name of the configured topic that surfaced this paper
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_topic: Option<String>,
}

impl Paper {
    /// Text used to embed the paper: title and abstract joined by a space.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.abstract_text)
    }

    /// Return a copy of this paper tagged with the given topic name.
    pub fn with_topic(self, topic: impl Into<String>) -> Self {
        Self {
            matched_topic: Some(topic.into()),
            ..self
        }
    }
}

/// A paper together with the scores accumulated by the ranking pipeline.
///
/// Each pipeline stage consumes a `ScoredPaper` and produces a new one, so a
/// scored value is never shared between pipeline invocations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredPaper {
    /// The underlying paper metadata
    #[serde(flatten)]
    pub paper: Paper,

    /// Base cosine similarity plus every additive bonus applied so far.
    /// Not bounded to [-1, 1] once bonuses are added.
    pub similarity_score: f64,

    /// Number of configured keywords found in the title
    pub keyword_matches: usize,

    /// Recency contribution already included in `similarity_score`
    pub recency_score: f64,
}

impl ScoredPaper {
    /// Wrap a paper with its base similarity. Bonus fields start at zero.
    pub fn new(paper: Paper, similarity_score: f64) -> Self {
        Self {
            paper,
            similarity_score,
            keyword_matches: 0,
            recency_score: 0.0,
        }
    }

    /// Produce a new value with the keyword bonus applied.
    pub fn with_keyword_bonus(self, matches: usize, bonus_per_match: f64) -> Self {
        Self {
            similarity_score: self.similarity_score + bonus_per_match * matches as f64,
            keyword_matches: matches,
            ..self
        }
    }

    /// Produce a new value with the recency bonus applied.
    pub fn with_recency(self, recency_score: f64) -> Self {
        Self {
            similarity_score: self.similarity_score + recency_score,
            recency_score,
            ..self
        }
    }
}
