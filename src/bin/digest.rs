//! Digest binary entry point.
//!
//! Fetches recent papers for every configured topic, ranks them against the
//! research interests and writes the Markdown and HTML digests.
//!
//! # Examples
//!
//! Weekly digest from arXiv:
//! ```bash
//! digest --config config/topics.toml
//! ```
//!
//! Offline run from a saved paper list, without touching the read-log:
//! ```bash
//! digest --papers-file papers.json --dry-run
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use paper_digest::{
    config::DigestConfig,
    digest::{render::format_authors, DigestGenerator, DigestReport},
    embedding::{
        fastembed::{parse_model_name, FastEmbedProvider},
        EmbeddingProvider,
    },
    models::{Paper, ScoredPaper},
    provider::{
        arxiv::ArxivProvider, json::JsonFilePaperProvider, PaperProvider, PaperQuery,
        ProviderResult,
    },
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Wrapper enum for paper providers to allow choosing one at runtime
enum DynamicPaperProvider {
    Arxiv(ArxivProvider),
    JsonFile(JsonFilePaperProvider),
}

#[async_trait]
impl PaperProvider for DynamicPaperProvider {
    async fn fetch_papers(&self, query: &PaperQuery) -> ProviderResult<Vec<Paper>> {
        match self {
            DynamicPaperProvider::Arxiv(p) => p.fetch_papers(query).await,
            DynamicPaperProvider::JsonFile(p) => p.fetch_papers(query).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            DynamicPaperProvider::Arxiv(p) => p.name(),
            DynamicPaperProvider::JsonFile(p) => p.name(),
        }
    }
}

/// Research paper digest generator
#[derive(Parser, Debug)]
#[command(
    name = "digest",
    version,
    about = "Generate a ranked digest of recent research papers",
    long_about = "Fetches recent papers for each configured topic, ranks them by semantic similarity to your research interests, and writes Markdown and HTML digests.

EXAMPLES:
  Weekly digest from arXiv:
    digest --config config/topics.toml

  Offline run from a saved paper list:
    digest --papers-file papers.json --dry-run

  Look back two weeks and keep the 20 best papers:
    digest --days-back 14 --top-n 20"
)]
struct DigestArgs {
    /// Configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/topics.toml")]
    config: PathBuf,

    /// Read papers from this JSON file instead of querying arXiv
    #[arg(long, value_name = "FILE")]
    papers_file: Option<PathBuf>,

    /// Directory for digest files (overrides config)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Read-log location (overrides config)
    #[arg(long, value_name = "FILE")]
    read_log: Option<PathBuf>,

    /// Include papers already surfaced by earlier digests
    #[arg(long)]
    no_filter_read: bool,

    /// Print the ranking without writing digest files or the read-log
    #[arg(long)]
    dry_run: bool,

    /// Only keep papers published within this many days (overrides config)
    #[arg(long, value_name = "DAYS")]
    days_back: Option<u32>,

    /// Number of papers in the digest (overrides config)
    #[arg(long, value_name = "N")]
    top_n: Option<usize>,

    /// FastEmbed model cache directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging subsystem with the specified level
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Load the config file and apply command-line overrides
fn load_config(args: &DigestArgs) -> Result<DigestConfig> {
    let mut config = DigestConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    info!("Loaded configuration from {:?}", args.config);

    if let Some(dir) = &args.output_dir {
        config.output.dir = dir.clone();
    }
    if let Some(read_log) = &args.read_log {
        config.output.read_log = read_log.clone();
    }
    if args.no_filter_read {
        config.ranking.filter_read = false;
    }
    if let Some(days) = args.days_back {
        config.fetch.days_back = days;
    }
    if let Some(top_n) = args.top_n {
        config.ranking.top_n_papers = i64::try_from(top_n).unwrap_or(i64::MAX);
    }

    config
        .validate()
        .context("Invalid configuration after applying command-line overrides")?;
    Ok(config)
}

/// Create the embedding provider named in the config
fn create_embedding_provider(args: &DigestArgs, config: &DigestConfig) -> Result<FastEmbedProvider> {
    let model = parse_model_name(&config.embedding.model)
        .with_context(|| format!("Unsupported embedding model '{}'", config.embedding.model))?;

    let cache_dir = args.cache_dir.clone().unwrap_or_else(|| {
        dirs::cache_dir()
            .map(|p| p.join("fastembed"))
            .unwrap_or_else(|| PathBuf::from(".cache/fastembed"))
    });
    debug!("Using cache directory: {:?}", cache_dir);

    let provider = FastEmbedProvider::new(Some(model), Some(cache_dir))
        .context("Failed to initialize FastEmbed provider")?;

    info!(
        "FastEmbed provider initialized: model={}, dimension={}",
        provider.model_name(),
        provider.dimension()
    );
    Ok(provider)
}

/// Create the paper source: a JSON file if one was given, arXiv otherwise
async fn create_paper_provider(
    args: &DigestArgs,
    config: &DigestConfig,
) -> Result<DynamicPaperProvider> {
    match &args.papers_file {
        Some(path) => {
            let provider = JsonFilePaperProvider::from_file(path)
                .await
                .with_context(|| format!("Failed to load papers from {:?}", path))?;
            info!("Loaded {} papers from {:?}", provider.len(), path);
            Ok(DynamicPaperProvider::JsonFile(provider))
        }
        None => {
            let provider = ArxivProvider::from_config(&config.fetch)
                .context("Failed to create arXiv client")?;
            Ok(DynamicPaperProvider::Arxiv(provider))
        }
    }
}

/// Create a progress bar for tracking topic fetches
fn create_progress_bar(topics: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(topics as u64);
    pb.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} topics | {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("##-"),
    );
    Ok(pb)
}

fn truncate_display(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// Format ranked papers as a pretty table
fn format_papers_table(papers: &[ScoredPaper]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new("Authors").add_attribute(Attribute::Bold),
        Cell::new("Published").add_attribute(Attribute::Bold),
        Cell::new("Topic").add_attribute(Attribute::Bold),
        Cell::new("Score").add_attribute(Attribute::Bold),
    ]);

    for (idx, scored) in papers.iter().enumerate() {
        let paper = &scored.paper;

        let score_cell = Cell::new(format!("{:.3}", scored.similarity_score));
        let score_cell = if scored.keyword_matches > 0 {
            score_cell.fg(Color::Green)
        } else {
            score_cell
        };

        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(truncate_display(&paper.title, 60)),
            Cell::new(truncate_display(&format_authors(&paper.authors, 2), 40)),
            Cell::new(paper.published.format("%Y-%m-%d")),
            Cell::new(paper.matched_topic.as_deref().unwrap_or("-")),
            score_cell,
        ]);
    }

    table.to_string()
}

fn print_summary(report: &DigestReport, elapsed: std::time::Duration) {
    println!("\n╔════════════════════════════════════════╗");
    println!("║      Digest Completed                  ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Papers fetched:       {:>16} ║", report.fetched);
    println!("║ Already read:         {:>16} ║", report.ranking.removed_as_read);
    println!("║ Above threshold:      {:>16} ║", report.ranking.above_threshold);
    println!("║ In digest:            {:>16} ║", report.papers.len());
    println!("║ Newly recorded:       {:>16} ║", report.recorded);
    println!("║ Elapsed time:         {:>13.2?} ║", elapsed);
    println!("╚════════════════════════════════════════╝");

    for file in &report.files {
        println!("Wrote {}", file.display());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = DigestArgs::parse();

    init_logging(&args.log_level).context("Failed to initialize logging")?;

    info!("Starting paper digest");
    debug!("CLI arguments: {:?}", args);

    let start_time = Instant::now();

    let config = load_config(&args)?;
    if config.topics.is_empty() {
        warn!("No topics configured in {:?}", args.config);
    }

    let embedding_provider = create_embedding_provider(&args, &config)?;
    let paper_provider = create_paper_provider(&args, &config).await?;
    info!("Fetching papers from {}", paper_provider.name());

    let topic_count = config.topics.len();
    let generator = DigestGenerator::new(config, paper_provider, embedding_provider)
        .await
        .context("Failed to embed research interests")?
        .with_dry_run(args.dry_run);

    let progress = create_progress_bar(topic_count)?;
    let report = generator
        .generate_with_progress(Utc::now(), |topic, count| {
            progress.set_message(format!("{} ({} papers)", topic.name, count));
            progress.inc(1);
        })
        .await
        .context("Digest generation failed")?;
    progress.finish_and_clear();

    let report = match report {
        Some(report) => report,
        None => {
            println!("No new relevant papers found; no digest written.");
            return Ok(());
        }
    };

    if let Some(diagnostic) = &report.ranking.read_log_diagnostic {
        if diagnostic.is_warning() {
            warn!("{}", diagnostic);
        }
    }

    println!("{}", format_papers_table(&report.papers));
    print_summary(&report, start_time.elapsed());

    if args.dry_run {
        info!("Dry run: no files written");
    }

    Ok(())
}
