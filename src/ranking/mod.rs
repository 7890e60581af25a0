//! Relevance ranking pipeline.
//!
//! Ranking turns a batch of fetched papers into the ordered list a digest
//! shows. One invocation runs these stages in order:
//!
//! 1. drop papers already recorded in the read-log (optional)
//! 2. cosine similarity against the research-interest embedding
//! 3. keyword bonus for configured keywords found in the title
//! 4. recency bonus relative to the batch's publication range
//! 5. minimum-score threshold
//! 6. stable sort, highest score first
//! 7. truncate to the requested count
//!
//! # Usage
//!
//! ```rust,no_run
//! use paper_digest::embedding::fastembed::FastEmbedProvider;
//! use paper_digest::ranking::{PaperRanker, RankingRequest};
//!
//! # async fn example(papers: Vec<paper_digest::models::Paper>) -> Result<(), Box<dyn std::error::Error>> {
//! let provider = FastEmbedProvider::new(None, None)?;
//! let mut ranker = PaperRanker::new(provider);
//! ranker.set_research_interests("robot grasping and 3D perception").await?;
//!
//! let request = RankingRequest {
//!     keywords: vec!["grasping".to_string()],
//!     ..RankingRequest::default()
//! };
//! let outcome = ranker.rank(papers, &request).await?;
//!
//! for scored in &outcome.papers {
//!     println!("{} - Score: {:.3}", scored.paper.title, scored.similarity_score);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};

use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::models::{Paper, ScoredPaper};
use crate::read_log::{ReadLogDiagnostic, ReadLogStore};

/// Errors that can occur while ranking papers.
#[derive(Debug, Error)]
pub enum RankingError {
    /// No research-interest embedding has been set
    #[error("Research interests not set; configure them before ranking")]
    NotConfigured,

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// A paper embedding does not match the interest embedding's length
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type for ranking operations.
pub type RankingResult<T> = Result<T, RankingError>;

/// Parameters for one ranking invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingRequest {
    /// Title keywords that earn a bonus, matched case-insensitively
    pub keywords: Vec<String>,

    /// Papers scoring below this are dropped
    pub min_threshold: f64,

    /// Maximum number of papers returned
    pub top_n: usize,

    /// Score added per matched keyword
    pub keyword_bonus: f64,

    /// Score added to the most recent paper of the batch
    pub recency_weight: f64,

    /// Skip papers already in the read-log
    pub filter_read: bool,

    /// Read-log consulted when `filter_read` is set
    pub read_log: PathBuf,
}

impl Default for RankingRequest {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            min_threshold: 0.3,
            top_n: 10,
            keyword_bonus: 0.05,
            recency_weight: 0.1,
            filter_read: true,
            read_log: PathBuf::from("data/read_papers.json"),
        }
    }
}

/// Counts describing what one ranking invocation did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankingReport {
    /// Papers handed to the pipeline
    pub input: usize,

    /// Papers dropped because the read-log already lists them
    pub removed_as_read: usize,

    /// Papers that received a similarity score
    pub scored: usize,

    /// Papers at or above the threshold
    pub above_threshold: usize,

    /// Papers returned after truncation
    pub returned: usize,

    /// Why the read-log was treated as empty, if it was
    pub read_log_diagnostic: Option<ReadLogDiagnostic>,
}

/// Ranked papers plus the report for the invocation that produced them.
#[derive(Debug, Clone)]
pub struct RankingOutcome {
    pub papers: Vec<ScoredPaper>,
    pub report: RankingReport,
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero magnitude. Callers must pass
/// vectors of equal length; extra trailing elements are ignored.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Number of keywords occurring in `title`, ignoring case.
///
/// Each keyword counts at most once and is matched as a substring exactly as
/// configured, surrounding whitespace included.
pub fn count_keyword_matches(title: &str, keywords: &[String]) -> usize {
    let title = title.to_lowercase();
    keywords
        .iter()
        .filter(|keyword| title.contains(&keyword.to_lowercase()))
        .count()
}

/// Add `bonus` per keyword found in each paper's title.
pub fn apply_keyword_bonus(
    papers: Vec<ScoredPaper>,
    keywords: &[String],
    bonus: f64,
) -> Vec<ScoredPaper> {
    if keywords.is_empty() {
        return papers;
    }

    papers
        .into_iter()
        .map(|scored| {
            let matches = count_keyword_matches(&scored.paper.title, keywords);
            scored.with_keyword_bonus(matches, bonus)
        })
        .collect()
}

/// Add a recency bonus scaled by each paper's position in the batch's
/// publication range.
///
/// The oldest paper gets nothing and the newest gets `weight`. A batch whose
/// papers share one timestamp gets no bonus at all.
pub fn apply_recency_weight(papers: Vec<ScoredPaper>, weight: f64) -> Vec<ScoredPaper> {
    let (min, max) = match (
        papers.iter().map(|s| s.paper.published).min(),
        papers.iter().map(|s| s.paper.published).max(),
    ) {
        (Some(min), Some(max)) => (min, max),
        _ => return papers,
    };

    let seconds = |delta: chrono::Duration| match delta.num_microseconds() {
        Some(micros) => micros as f64 / 1e6,
        None => delta.num_milliseconds() as f64 / 1e3,
    };
    let range = match seconds(max - min) {
        r if r > 0.0 => r,
        _ => 1.0,
    };

    papers
        .into_iter()
        .map(|scored| {
            let factor = seconds(scored.paper.published - min) / range;
            scored.with_recency(factor * weight)
        })
        .collect()
}

/// Keep papers scoring at least `min_threshold`, order them by descending
/// score, and cut the list to `top_n`.
///
/// The sort is stable: equal scores keep their input order. Returns the
/// number of papers that passed the threshold along with the selection.
pub fn select_top(
    papers: Vec<ScoredPaper>,
    min_threshold: f64,
    top_n: usize,
) -> (usize, Vec<ScoredPaper>) {
    let mut selected: Vec<ScoredPaper> = papers
        .into_iter()
        .filter(|scored| scored.similarity_score >= min_threshold)
        .collect();
    let above_threshold = selected.len();

    selected.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
    selected.truncate(top_n);

    (above_threshold, selected)
}

/// Ranks papers against a research-interest embedding.
pub struct PaperRanker<E>
where
    E: EmbeddingProvider,
{
    /// Embedding provider for interests and paper text
    embedding_provider: E,

    /// Reference vector papers are compared against
    interest_embedding: Option<Vec<f32>>,
}

impl<E> PaperRanker<E>
where
    E: EmbeddingProvider,
{
    /// Create a ranker with no research interests set.
    pub fn new(embedding_provider: E) -> Self {
        Self {
            embedding_provider,
            interest_embedding: None,
        }
    }

    /// Use a precomputed interest embedding.
    pub fn with_interest_vector(mut self, vector: Vec<f32>) -> Self {
        self.interest_embedding = Some(vector);
        self
    }

    /// Embed `interests` and use the result as the reference vector.
    pub async fn set_research_interests(&mut self, interests: &str) -> RankingResult<()> {
        let embedding = self.embedding_provider.embed(interests).await?;
        info!(
            "Research interests embedded ({} dimensions, model {})",
            embedding.len(),
            self.embedding_provider.model_name()
        );
        self.interest_embedding = Some(embedding);
        Ok(())
    }

    /// The reference vector, if one has been set.
    pub fn interest_embedding(&self) -> Option<&[f32]> {
        self.interest_embedding.as_deref()
    }

    /// Score papers by cosine similarity to the interest embedding.
    ///
    /// All papers are embedded in one batch call. Output order matches input
    /// order.
    ///
    /// # Errors
    /// `NotConfigured` if no interest embedding is set and `papers` is not
    /// empty; `DimensionMismatch` if a paper vector has the wrong length.
    pub async fn compute_similarity(&self, papers: Vec<Paper>) -> RankingResult<Vec<ScoredPaper>> {
        if papers.is_empty() {
            return Ok(Vec::new());
        }

        let interest = self
            .interest_embedding
            .as_deref()
            .ok_or(RankingError::NotConfigured)?;

        let texts: Vec<String> = papers.iter().map(Paper::embedding_text).collect();
        let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let embeddings = self.embedding_provider.embed_batch(&text_refs).await?;

        if embeddings.len() != papers.len() {
            return Err(RankingError::Embedding(EmbeddingError::BackendError(format!(
                "expected {} embeddings, got {}",
                papers.len(),
                embeddings.len()
            ))));
        }

        papers
            .into_iter()
            .zip(embeddings)
            .map(|(paper, embedding)| {
                if embedding.len() != interest.len() {
                    return Err(RankingError::DimensionMismatch {
                        expected: interest.len(),
                        actual: embedding.len(),
                    });
                }
                let score = cosine_similarity(&embedding, interest) as f64;
                Ok(ScoredPaper::new(paper, score))
            })
            .collect()
    }

    /// Run the full pipeline over `papers`.
    pub async fn rank(
        &self,
        papers: Vec<Paper>,
        request: &RankingRequest,
    ) -> RankingResult<RankingOutcome> {
        let span = info_span!(
            "rank_papers",
            input = papers.len(),
            top_n = request.top_n,
            threshold = request.min_threshold
        );
        self.rank_inner(papers, request).instrument(span).await
    }

    async fn rank_inner(
        &self,
        papers: Vec<Paper>,
        request: &RankingRequest,
    ) -> RankingResult<RankingOutcome> {
        let mut report = RankingReport {
            input: papers.len(),
            ..RankingReport::default()
        };

        if papers.is_empty() {
            info!("No papers to rank");
            return Ok(RankingOutcome {
                papers: Vec::new(),
                report,
            });
        }

        let papers = if request.filter_read {
            let outcome = ReadLogStore::new(&request.read_log).filter_unread(papers);
            report.removed_as_read = outcome.removed;
            report.read_log_diagnostic = outcome.diagnostic;
            outcome.papers
        } else {
            papers
        };

        if papers.is_empty() {
            info!("No new papers to rank");
            return Ok(RankingOutcome {
                papers: Vec::new(),
                report,
            });
        }

        info!("Ranking {} papers", papers.len());
        let scored = self.compute_similarity(papers).await?;
        report.scored = scored.len();

        let scored = apply_keyword_bonus(scored, &request.keywords, request.keyword_bonus);
        let scored = apply_recency_weight(scored, request.recency_weight);
        debug!("Applied keyword and recency bonuses");

        let (above_threshold, ranked) = select_top(scored, request.min_threshold, request.top_n);
        report.above_threshold = above_threshold;
        report.returned = ranked.len();

        info!(
            "{} papers above threshold {:.2}, returning top {}",
            above_threshold,
            request.min_threshold,
            ranked.len()
        );

        Ok(RankingOutcome {
            papers: ranked,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingResult;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::{Arc, Mutex};

    // Mock provider: returns the vector registered for the first title found
    // in the text, or the fallback vector.
    struct MockEmbeddingProvider {
        vectors: Vec<(String, Vec<f32>)>,
        fallback: Vec<f32>,
        batch_sizes: Arc<Mutex<Vec<usize>>>,
        should_fail: bool,
    }

    impl MockEmbeddingProvider {
        fn new(vectors: Vec<(&str, Vec<f32>)>) -> Self {
            Self {
                vectors: vectors
                    .into_iter()
                    .map(|(title, v)| (title.to_string(), v))
                    .collect(),
                fallback: vec![1.0, 0.0],
                batch_sizes: Arc::new(Mutex::new(Vec::new())),
                should_fail: false,
            }
        }

        fn with_failure() -> Self {
            Self {
                should_fail: true,
                ..Self::new(vec![])
            }
        }

        fn lookup(&self, text: &str) -> Vec<f32> {
            self.vectors
                .iter()
                .find(|(title, _)| text.starts_with(title.as_str()))
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddingProvider {
        async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            if self.should_fail {
                return Err(EmbeddingError::BackendError("Mock embedding failure".to_string()));
            }
            Ok(self.lookup(text))
        }

        async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
            if self.should_fail {
                return Err(EmbeddingError::BackendError("Mock embedding failure".to_string()));
            }
            self.batch_sizes.lock().unwrap().push(texts.len());
            Ok(texts.iter().map(|text| self.lookup(text)).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "mock-model"
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn create_test_paper(id: &str, title: &str, published: DateTime<Utc>) -> Paper {
        Paper {
            id: id.to_string(),
            title: title.to_string(),
            authors: vec!["Test Author".to_string()],
            abstract_text: "Test abstract".to_string(),
            url: format!("http://arxiv.org/abs/{}", id),
            pdf_url: None,
            published,
            categories: vec!["cs.RO".to_string()],
            primary_category: None,
            matched_topic: None,
        }
    }

    fn scored(id: &str, title: &str, score: f64) -> ScoredPaper {
        ScoredPaper::new(create_test_paper(id, title, day(1)), score)
    }

    fn ids(papers: &[ScoredPaper]) -> Vec<&str> {
        papers.iter().map(|s| s.paper.id.as_str()).collect()
    }

    fn unit(x: f32) -> Vec<f32> {
        vec![x, (1.0 - x * x).sqrt()]
    }

    // Two papers: A older with base 0.40 and "grasping" in the title,
    // B newer with base 0.50.
    fn scenario() -> (MockEmbeddingProvider, Vec<Paper>) {
        let provider = MockEmbeddingProvider::new(vec![
            ("Robotic grasping in clutter", unit(0.4)),
            ("Neural scene fields", unit(0.5)),
        ]);
        let papers = vec![
            create_test_paper("A", "Robotic grasping in clutter", day(1)),
            create_test_paper("B", "Neural scene fields", day(7)),
        ];
        (provider, papers)
    }

    fn scenario_request() -> RankingRequest {
        RankingRequest {
            keywords: vec!["grasping".to_string()],
            min_threshold: 0.3,
            top_n: 10,
            keyword_bonus: 0.05,
            recency_weight: 0.1,
            filter_read: false,
            read_log: PathBuf::from("unused.json"),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[2.0, 2.0], &[1.0, 1.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_keyword_matches_case_insensitive() {
        let keywords = vec!["Grasping".to_string(), "3D".to_string(), "SLAM".to_string()];
        assert_eq!(count_keyword_matches("Dexterous grasping of 3d objects", &keywords), 2);
        assert_eq!(count_keyword_matches("Unrelated", &keywords), 0);
        // A keyword counts once even if repeated in the title
        assert_eq!(count_keyword_matches("grasping, grasping", &keywords), 1);
    }

    #[test]
    fn test_keyword_whitespace_is_part_of_the_match() {
        let keywords = vec![" arm".to_string()];
        assert_eq!(count_keyword_matches("Farm robots", &keywords), 0);
        assert_eq!(count_keyword_matches("Soft arm control", &keywords), 1);
        assert_eq!(count_keyword_matches("Arm control", &keywords), 0);
        assert_eq!(count_keyword_matches("anything", &["".to_string()]), 1);
    }

    #[test]
    fn test_keyword_bonus_empty_list_is_noop() {
        let papers = vec![scored("a", "grasping", 0.5)];
        let result = apply_keyword_bonus(papers.clone(), &[], 0.05);
        assert_eq!(result, papers);
    }

    #[test]
    fn test_keyword_bonus_is_additive() {
        let keywords = vec!["grasping".to_string(), "robot".to_string()];
        let result = apply_keyword_bonus(vec![scored("a", "Robot grasping", 0.5)], &keywords, 0.05);
        assert_eq!(result[0].keyword_matches, 2);
        assert!((result[0].similarity_score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_recency_bounds() {
        let papers = vec![
            ScoredPaper::new(create_test_paper("old", "t", day(1)), 0.0),
            ScoredPaper::new(create_test_paper("mid", "t", day(4)), 0.0),
            ScoredPaper::new(create_test_paper("new", "t", day(7)), 0.0),
        ];
        let result = apply_recency_weight(papers, 0.1);

        assert_eq!(result[0].recency_score, 0.0);
        assert!((result[1].recency_score - 0.05).abs() < 1e-9);
        assert!((result[2].recency_score - 0.1).abs() < 1e-9);
        for s in &result {
            assert!(s.recency_score >= 0.0 && s.recency_score <= 0.1);
            assert_eq!(s.similarity_score, s.recency_score);
        }
    }

    #[test]
    fn test_recency_same_timestamp_gets_no_bonus() {
        let papers = vec![scored("a", "t", 0.4), scored("b", "t", 0.5)];
        let result = apply_recency_weight(papers, 0.1);
        assert!(result.iter().all(|s| s.recency_score == 0.0));
        assert_eq!(result[1].similarity_score, 0.5);
    }

    #[test]
    fn test_recency_resolves_sub_millisecond_gaps() {
        let newer = day(1) + chrono::Duration::microseconds(250);
        let papers = vec![
            ScoredPaper::new(create_test_paper("old", "t", day(1)), 0.0),
            ScoredPaper::new(create_test_paper("new", "t", newer), 0.0),
        ];
        let result = apply_recency_weight(papers, 0.1);

        assert_eq!(result[0].recency_score, 0.0);
        assert!((result[1].recency_score - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_recency_empty_batch() {
        assert!(apply_recency_weight(Vec::new(), 0.1).is_empty());
    }

    #[test]
    fn test_select_top_threshold_sort_truncate() {
        let papers = vec![
            scored("low", "t", 0.1),
            scored("mid", "t", 0.5),
            scored("high", "t", 0.9),
            scored("edge", "t", 0.3),
        ];
        let (above, result) = select_top(papers, 0.3, 2);
        assert_eq!(above, 3);
        assert_eq!(ids(&result), vec!["high", "mid"]);
    }

    #[test]
    fn test_select_top_is_stable_for_ties() {
        let papers = vec![
            scored("first", "t", 0.5),
            scored("second", "t", 0.5),
            scored("third", "t", 0.5),
        ];
        let (_, result) = select_top(papers, 0.0, 10);
        assert_eq!(ids(&result), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_select_top_zero_returns_empty() {
        let (above, result) = select_top(vec![scored("a", "t", 0.9)], 0.0, 0);
        assert_eq!(above, 1);
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let (provider, papers) = scenario();
        let ranker = PaperRanker::new(provider).with_interest_vector(vec![1.0, 0.0]);

        let outcome = ranker.rank(papers, &scenario_request()).await.unwrap();

        assert_eq!(ids(&outcome.papers), vec!["B", "A"]);
        let b = &outcome.papers[0];
        let a = &outcome.papers[1];
        assert!((b.similarity_score - 0.60).abs() < 1e-6);
        assert_eq!(b.keyword_matches, 0);
        assert!((b.recency_score - 0.1).abs() < 1e-9);
        assert!((a.similarity_score - 0.45).abs() < 1e-6);
        assert_eq!(a.keyword_matches, 1);
        assert_eq!(a.recency_score, 0.0);

        assert_eq!(outcome.report.input, 2);
        assert_eq!(outcome.report.scored, 2);
        assert_eq!(outcome.report.returned, 2);
    }

    #[tokio::test]
    async fn test_filtering_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("read_papers.json");
        ReadLogStore::new(&log_path).record(["A"], day(8)).unwrap();

        let (provider, papers) = scenario();
        let ranker = PaperRanker::new(provider).with_interest_vector(vec![1.0, 0.0]);
        let request = RankingRequest {
            filter_read: true,
            read_log: log_path,
            ..scenario_request()
        };

        let outcome = ranker.rank(papers, &request).await.unwrap();
        assert_eq!(ids(&outcome.papers), vec!["B"]);
        assert_eq!(outcome.report.removed_as_read, 1);
        assert!(outcome.report.read_log_diagnostic.is_none());
    }

    #[tokio::test]
    async fn test_missing_read_log_keeps_all_papers() {
        let dir = tempfile::tempdir().unwrap();
        let (provider, papers) = scenario();
        let ranker = PaperRanker::new(provider).with_interest_vector(vec![1.0, 0.0]);
        let request = RankingRequest {
            filter_read: true,
            read_log: dir.path().join("absent.json"),
            ..scenario_request()
        };

        let outcome = ranker.rank(papers, &request).await.unwrap();
        assert_eq!(outcome.papers.len(), 2);
        assert!(matches!(
            outcome.report.read_log_diagnostic,
            Some(ReadLogDiagnostic::Missing { .. })
        ));
    }

    #[tokio::test]
    async fn test_single_batch_call_per_run() {
        let (provider, papers) = scenario();
        let batch_sizes = provider.batch_sizes.clone();
        let ranker = PaperRanker::new(provider).with_interest_vector(vec![1.0, 0.0]);

        ranker.rank(papers, &scenario_request()).await.unwrap();
        assert_eq!(*batch_sizes.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_not_configured() {
        let (provider, papers) = scenario();
        let ranker = PaperRanker::new(provider);

        let result = ranker.rank(papers, &scenario_request()).await;
        assert!(matches!(result, Err(RankingError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_empty_input_is_not_an_error() {
        let (provider, _) = scenario();
        let ranker = PaperRanker::new(provider);

        let outcome = ranker.rank(Vec::new(), &scenario_request()).await.unwrap();
        assert!(outcome.papers.is_empty());
        assert_eq!(outcome.report, RankingReport::default());
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let (provider, papers) = scenario();
        let ranker = PaperRanker::new(provider).with_interest_vector(vec![1.0, 0.0, 0.0]);

        match ranker.compute_similarity(papers).await {
            Err(RankingError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("Expected DimensionMismatch, got {:?}", other.map(|p| p.len())),
        }
    }

    #[tokio::test]
    async fn test_embedding_error_propagation() {
        let ranker =
            PaperRanker::new(MockEmbeddingProvider::with_failure()).with_interest_vector(vec![1.0, 0.0]);
        let (_, papers) = scenario();

        let result = ranker.rank(papers, &scenario_request()).await;
        assert!(matches!(result, Err(RankingError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_set_research_interests() {
        let mut ranker = PaperRanker::new(MockEmbeddingProvider::new(vec![]));
        assert!(ranker.interest_embedding().is_none());

        ranker.set_research_interests("robot learning").await.unwrap();
        assert_eq!(ranker.interest_embedding(), Some(&[1.0f32, 0.0][..]));
    }

    #[tokio::test]
    async fn test_threshold_excluding_everything() {
        let (provider, papers) = scenario();
        let ranker = PaperRanker::new(provider).with_interest_vector(vec![1.0, 0.0]);
        let request = RankingRequest {
            min_threshold: 0.99,
            ..scenario_request()
        };

        let outcome = ranker.rank(papers, &request).await.unwrap();
        assert!(outcome.papers.is_empty());
        assert_eq!(outcome.report.scored, 2);
        assert_eq!(outcome.report.above_threshold, 0);
    }

    #[tokio::test]
    async fn test_ranking_is_deterministic() {
        let (provider, papers) = scenario();
        let ranker = PaperRanker::new(provider).with_interest_vector(vec![1.0, 0.0]);

        let first = ranker.rank(papers.clone(), &scenario_request()).await.unwrap();
        let second = ranker.rank(papers, &scenario_request()).await.unwrap();
        assert_eq!(first.papers, second.papers);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn batch() -> impl Strategy<Value = Vec<ScoredPaper>> {
            prop::collection::vec((-1.0f64..1.5, 0usize..3), 0..25).prop_map(|rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(i, (score, title))| {
                        let title = ["robot grasping", "scene fields", "grasping 3D"][title];
                        scored(&format!("p{}", i), title, score)
                    })
                    .collect()
            })
        }

        proptest! {
            #[test]
            fn threshold_is_monotonic(papers in batch(), t1 in -1.0f64..1.5, t2 in -1.0f64..1.5) {
                let (low, high) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
                let (_, loose) = select_top(papers.clone(), low, usize::MAX);
                let (_, strict) = select_top(papers, high, usize::MAX);

                let loose_ids = ids(&loose);
                prop_assert!(strict.len() <= loose.len());
                for id in ids(&strict) {
                    prop_assert!(loose_ids.contains(&id));
                }
            }

            #[test]
            fn result_never_exceeds_top_n(papers in batch(), top_n in 0usize..30) {
                let (_, result) = select_top(papers, -2.0, top_n);
                prop_assert!(result.len() <= top_n);
            }

            #[test]
            fn result_is_sorted_descending(papers in batch(), threshold in -1.0f64..1.5) {
                let (_, result) = select_top(papers, threshold, usize::MAX);
                for pair in result.windows(2) {
                    prop_assert!(pair[0].similarity_score >= pair[1].similarity_score);
                }
                for s in &result {
                    prop_assert!(s.similarity_score >= threshold);
                }
            }

            #[test]
            fn keyword_bonus_adds_bonus_times_matches(papers in batch(), bonus in 0.0f64..0.5) {
                let keywords = vec!["grasping".to_string(), "3d".to_string()];
                let result = apply_keyword_bonus(papers.clone(), &keywords, bonus);

                for (before, after) in papers.iter().zip(&result) {
                    let expected = before.similarity_score + bonus * after.keyword_matches as f64;
                    prop_assert!((after.similarity_score - expected).abs() < 1e-12);
                    prop_assert_eq!(
                        after.keyword_matches,
                        count_keyword_matches(&before.paper.title, &keywords)
                    );
                }
            }
        }
    }
}
