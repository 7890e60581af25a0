//! Paper Digest - a ranked digest of recent research papers.
//!
//! This library fetches recent papers from arXiv, ranks them by semantic
//! similarity to a free-text description of your research interests, and
//! renders the best ones as Markdown and HTML digests. Papers surfaced once are
//! recorded in a read-log and skipped by later digests.
//!
//! # Architecture
//!
//! The system is organized into several key modules:
//!
//! - **models**: Core data structures (Paper, ScoredPaper)
//! - **config**: TOML configuration (topics, ranking, fetch and output settings)
//! - **provider**: Paper sources (arXiv API client, JSON file)
//! - **embedding**: Text embedding generation
//! - **ranking**: Similarity scoring, bonuses, threshold and top-N selection
//! - **read_log**: Persistent record of already surfaced papers
//! - **digest**: Run orchestration and Markdown/HTML rendering
//!
//! # Workflow
//!
//! 1. Fetch recent papers for each configured topic
//! 2. Merge topics, keeping the first topic that surfaced each paper
//! 3. Drop papers listed in the read-log
//! 4. Score by cosine similarity to the research-interest embedding
//! 5. Add keyword and recency bonuses
//! 6. Keep papers above the threshold, best first, up to top-N
//! 7. Write the digests and record the surfaced ids
//!
//! # Example
//!
//! ```ignore
//! use paper_digest::{
//!     config::DigestConfig,
//!     digest::DigestGenerator,
//!     embedding::fastembed::FastEmbedProvider,
//!     provider::arxiv::ArxivProvider,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DigestConfig::from_file("config/topics.toml")?;
//!     let provider = ArxivProvider::from_config(&config.fetch)?;
//!     let embedding = FastEmbedProvider::new(None, None)?;
//!
//!     let generator = DigestGenerator::new(config, provider, embedding).await?;
//!     if let Some(report) = generator.generate(chrono::Utc::now()).await? {
//!         for scored in &report.papers {
//!             println!("{}: {:.3}", scored.paper.title, scored.similarity_score);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

// Public modules
pub mod config;
pub mod digest;
pub mod embedding;
pub mod models;
pub mod provider;
pub mod ranking;
pub mod read_log;

// Re-export commonly used types at the crate root
pub use config::DigestConfig;
pub use digest::{DigestGenerator, DigestReport};
pub use embedding::EmbeddingProvider;
pub use models::{Paper, ScoredPaper};
pub use provider::{PaperProvider, PaperQuery};
pub use ranking::{PaperRanker, RankingOutcome, RankingReport, RankingRequest};
pub use read_log::{ReadLogDiagnostic, ReadLogStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model name
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
