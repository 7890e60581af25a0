//! FastEmbed embedding provider implementation.
//!
//! Runs a sentence-embedding model locally through the fastembed library, so a
//! digest run needs no embedding API. The default model is all-MiniLM-L6-v2.

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Local embedding provider backed by fastembed.
#[derive(Clone)]
pub struct FastEmbedProvider {
    /// The embedding model instance (shared between clones)
    model: Arc<Mutex<TextEmbedding>>,

    /// Model identifier
    model_name: String,

    /// Dimension of the embedding vectors
    embedding_dimension: usize,
}

/// Map a user-facing model name to a fastembed model.
///
/// Accepts the sentence-transformers style names (`all-MiniLM-L6-v2`,
/// `bge-small-en-v1.5`, ...) as well as the fastembed enum names, ignoring case.
pub fn parse_model_name(name: &str) -> EmbeddingResult<EmbeddingModel> {
    let key: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    match key.as_str() {
        "allminilml6v2" | "sentencetransformersallminilml6v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "bgesmallenv15" | "baaibgesmallenv15" => Ok(EmbeddingModel::BGESmallENV15),
        "bgebaseenv15" | "baaibgebaseenv15" => Ok(EmbeddingModel::BGEBaseENV15),
        "bgelargeenv15" | "baaibgelargeenv15" => Ok(EmbeddingModel::BGELargeENV15),
        "paraphrasemlminilml12v2" | "paraphrasemultilingualminilml12v2" => {
            Ok(EmbeddingModel::ParaphraseMLMiniLML12V2)
        }
        _ => Err(EmbeddingError::ConfigError(format!(
            "Unsupported embedding model: {}",
            name
        ))),
    }
}

fn model_dimension(model: &EmbeddingModel) -> usize {
    match model {
        EmbeddingModel::BGEBaseENV15 => 768,
        EmbeddingModel::BGELargeENV15 => 1024,
        _ => 384,
    }
}

impl FastEmbedProvider {
    /// Create a new FastEmbed provider.
    ///
    /// # Arguments
    /// * `model` - Model to use (defaults to AllMiniLML6V2)
    /// * `cache_dir` - Directory where model files are cached
    ///
    /// # Errors
    /// Returns `EmbeddingError::ConfigError` if the model cannot be loaded
    pub fn new(model: Option<EmbeddingModel>, cache_dir: Option<PathBuf>) -> EmbeddingResult<Self> {
        let model_type = model.unwrap_or(EmbeddingModel::AllMiniLML6V2);
        let model_name = format!("{:?}", model_type);
        let embedding_dimension = model_dimension(&model_type);

        let mut init_options = InitOptions::new(model_type);
        if let Some(dir) = cache_dir {
            debug!("Using fastembed cache directory: {}", dir.display());
            init_options = init_options.with_cache_dir(dir);
        }

        let text_embedding = TextEmbedding::try_new(init_options).map_err(|e| {
            EmbeddingError::ConfigError(format!("Failed to initialize FastEmbed model: {}", e))
        })?;

        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            model_name,
            embedding_dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Text cannot be empty".to_string()));
        }

        let mut embeddings = self.embed_batch(&[text]).await?;
        embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::BackendError("No embedding generated".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput(
                "All texts must be non-empty".to_string(),
            ));
        }

        let mut model = self.model.lock().await;
        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        let embeddings = model.embed(text_strings, None).map_err(|e| {
            EmbeddingError::BackendError(format!("Batch embedding generation failed: {}", e))
        })?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::BackendError(format!(
                "Expected {} embeddings, model returned {}",
                texts.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

// TextEmbedding does not implement Debug
impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("embedding_dimension", &self.embedding_dimension)
            .finish()
    }
}
