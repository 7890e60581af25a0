//! Digest generation.
//!
//! [`DigestGenerator`] ties a run together: fetch every configured topic,
//! merge the results, rank them, write the digest files and record the
//! surfaced papers in the read-log.
//!
//! ```ignore
//! let config = DigestConfig::from_file("config/topics.toml")?;
//! let provider = ArxivProvider::from_config(&config.fetch)?;
//! let embedding = FastEmbedProvider::new(None, None)?;
//!
//! let generator = DigestGenerator::new(config, provider, embedding).await?;
//! if let Some(report) = generator.generate(Utc::now()).await? {
//!     println!("Wrote {} files", report.files.len());
//! }
//! ```

pub mod render;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{DigestConfig, TopicConfig};
use crate::embedding::EmbeddingProvider;
use crate::models::{Paper, ScoredPaper};
use crate::provider::{PaperProvider, PaperQuery};
use crate::ranking::{PaperRanker, RankingError, RankingOutcome, RankingReport};
use crate::read_log::{ReadLogError, ReadLogStore};

use self::render::{DigestRenderer, HtmlRenderer, MarkdownRenderer};

/// Errors that can occur during digest generation.
#[derive(Debug, Error)]
pub enum DigestError {
    /// Ranking failed
    #[error("Ranking error: {0}")]
    Ranking(#[from] RankingError),

    /// Recording surfaced papers failed
    #[error("Read-log error: {0}")]
    ReadLog(#[from] ReadLogError),

    /// Writing a digest file failed
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for digest operations.
pub type DigestResult<T> = Result<T, DigestError>;

/// Summary of a completed digest run.
#[derive(Debug, Clone)]
pub struct DigestReport {
    /// Unique papers fetched across all topics
    pub fetched: usize,

    /// Counts from the ranking stage
    pub ranking: RankingReport,

    /// The ranked papers included in the digest
    pub papers: Vec<ScoredPaper>,

    /// Files written, in write order. Empty for dry runs.
    pub files: Vec<PathBuf>,

    /// Ids newly added to the read-log
    pub recorded: usize,
}

/// Coordinates one digest run.
pub struct DigestGenerator<E, P>
where
    E: EmbeddingProvider,
    P: PaperProvider,
{
    config: DigestConfig,

    /// Source of paper metadata
    provider: P,

    /// Ranker holding the research-interest embedding
    ranker: PaperRanker<E>,

    /// Render and print only; leave the filesystem alone
    dry_run: bool,
}

impl<E, P> DigestGenerator<E, P>
where
    E: EmbeddingProvider,
    P: PaperProvider,
{
    /// Create a generator, embedding the configured research interests.
    ///
    /// Without research interests the generator is still created, but
    /// ranking a non-empty batch will fail with `NotConfigured`.
    pub async fn new(config: DigestConfig, provider: P, embedding_provider: E) -> DigestResult<Self> {
        let mut ranker = PaperRanker::new(embedding_provider);

        if config.research_interests.trim().is_empty() {
            warn!("No research interests defined in config");
        } else {
            ranker.set_research_interests(&config.research_interests).await?;
        }

        Ok(Self {
            config,
            provider,
            ranker,
            dry_run: false,
        })
    }

    /// Skip writing digest files and the read-log.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Query for one topic, with the cutoff `days_back` days before `now`.
    pub fn topic_query(&self, topic: &TopicConfig, now: DateTime<Utc>) -> PaperQuery {
        PaperQuery::new(topic.query.clone())
            .with_categories(topic.categories.clone())
            .with_cutoff(now - Duration::days(i64::from(self.config.fetch.days_back)))
    }

    /// Fetch papers for every topic and merge them.
    ///
    /// See [`fetch_all_papers_with_progress`](Self::fetch_all_papers_with_progress).
    pub async fn fetch_all_papers(&self, now: DateTime<Utc>) -> Vec<Paper> {
        self.fetch_all_papers_with_progress(now, |_, _| {}).await
    }

    /// Fetch papers for every topic and merge them, calling `on_topic` with
    /// each topic and the number of papers it returned.
    ///
    /// Papers are kept in topic order. A paper returned by several topics is
    /// kept once and tagged with the first topic that returned it. A topic
    /// whose fetch fails is logged and skipped.
    pub async fn fetch_all_papers_with_progress<F>(
        &self,
        now: DateTime<Utc>,
        mut on_topic: F,
    ) -> Vec<Paper>
    where
        F: FnMut(&TopicConfig, usize),
    {
        if self.config.topics.is_empty() {
            warn!("No topics configured");
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut all_papers = Vec::new();

        for topic in &self.config.topics {
            info!("Fetching papers for topic: {}", topic.name);
            let query = self.topic_query(topic, now);

            let papers = match self.provider.fetch_papers(&query).await {
                Ok(papers) => papers,
                Err(e) => {
                    error!(
                        "Failed to fetch topic '{}' from {}: {}",
                        topic.name,
                        self.provider.name(),
                        e
                    );
                    Vec::new()
                }
            };
            info!("Found {} papers for topic '{}'", papers.len(), topic.name);
            on_topic(topic, papers.len());

            for paper in papers {
                if seen.insert(paper.id.clone()) {
                    all_papers.push(paper.with_topic(topic.name.clone()));
                }
            }
        }

        info!("Fetched {} unique papers across all topics", all_papers.len());
        all_papers
    }

    /// Rank papers with the configured parameters.
    pub async fn rank_all_papers(&self, papers: Vec<Paper>) -> DigestResult<RankingOutcome> {
        let request = self.config.ranking_request();
        Ok(self.ranker.rank(papers, &request).await?)
    }

    /// Write the dated Markdown digest, the `latest` copy and the HTML digest.
    pub fn write_outputs(
        &self,
        papers: &[ScoredPaper],
        generated_at: DateTime<Utc>,
    ) -> DigestResult<Vec<PathBuf>> {
        let dir = &self.config.output.dir;
        std::fs::create_dir_all(dir).map_err(|source| DigestError::Io {
            path: dir.clone(),
            source,
        })?;

        let date = generated_at.format("%Y-%m-%d");
        let dated = |renderer: &dyn DigestRenderer| {
            dir.join(format!("digest_{}.{}", date, renderer.extension()))
        };
        let markdown = MarkdownRenderer.render(papers, generated_at);
        let html = HtmlRenderer.render(papers, generated_at);

        let outputs = [
            (dated(&MarkdownRenderer), &markdown),
            (
                dir.join(format!("digest_latest.{}", MarkdownRenderer.extension())),
                &markdown,
            ),
            (dated(&HtmlRenderer), &html),
        ];

        let mut written = Vec::with_capacity(outputs.len());
        for (path, content) in outputs {
            write_file(&path, content)?;
            info!("Saved digest to {}", path.display());
            written.push(path);
        }
        Ok(written)
    }

    /// Run the whole digest.
    ///
    /// Returns `None` when nothing was fetched or nothing survived ranking;
    /// no files are written and the read-log is untouched in that case.
    pub async fn generate(&self, now: DateTime<Utc>) -> DigestResult<Option<DigestReport>> {
        self.generate_with_progress(now, |_, _| {}).await
    }

    /// [`generate`](Self::generate), reporting per-topic fetch progress.
    pub async fn generate_with_progress<F>(
        &self,
        now: DateTime<Utc>,
        on_topic: F,
    ) -> DigestResult<Option<DigestReport>>
    where
        F: FnMut(&TopicConfig, usize),
    {
        info!("Starting digest generation");

        let papers = self.fetch_all_papers_with_progress(now, on_topic).await;
        if papers.is_empty() {
            warn!("No papers found");
            return Ok(None);
        }
        let fetched = papers.len();

        let RankingOutcome { papers, report } = self.rank_all_papers(papers).await?;
        if papers.is_empty() {
            warn!("No papers passed ranking threshold");
            return Ok(None);
        }

        if self.dry_run {
            info!("Dry run: skipping digest files and read-log");
            return Ok(Some(DigestReport {
                fetched,
                ranking: report,
                papers,
                files: Vec::new(),
                recorded: 0,
            }));
        }

        let files = self.write_outputs(&papers, now)?;

        let store = ReadLogStore::new(&self.config.output.read_log);
        let recorded = store
            .record(papers.iter().map(|s| s.paper.id.as_str()), now)?
            .map(|entry| entry.count)
            .unwrap_or(0);

        info!("Digest generation complete");
        Ok(Some(DigestReport {
            fetched,
            ranking: report,
            papers,
            files,
            recorded,
        }))
    }
}

fn write_file(path: &Path, content: &str) -> DigestResult<()> {
    std::fs::write(path, content).map_err(|source| DigestError::Io {
        path: path.to_path_buf(),
        source,
    })
}
