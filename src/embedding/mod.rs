//! Embedding provider abstraction and implementations.
//!
//! The ranking pipeline never computes embeddings itself. It is handed an
//! [`EmbeddingProvider`] and asks it for one vector for the research interests
//! and one batch of vectors per ranking run.

pub mod fastembed;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Model or backend failure while generating vectors
    #[error("Embedding backend failed: {0}")]
    BackendError(String),

    /// Invalid input text (e.g., empty)
    #[error("Invalid input text: {0}")]
    InvalidInput(String),

    /// Configuration error (e.g., model could not be loaded)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for embedding operations.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Trait for text embedding providers.
///
/// Implementors turn text into fixed-length vectors. The trait is async so
/// local models and remote services can sit behind the same interface.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Generate embeddings for multiple texts in a single call.
    ///
    /// The i-th output vector belongs to the i-th input text.
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Dimension of the vectors produced by this provider.
    fn dimension(&self) -> usize;

    /// Model name/identifier for this provider.
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider;

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed(&self, _text: &str) -> EmbeddingResult<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_batch_through_trait_object() {
        let provider: Box<dyn EmbeddingProvider> = Box::new(FixedProvider);
        let vectors = provider.embed_batch(&["a", "b", "c"]).await.unwrap();

        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|v| v.len() == provider.dimension()));
        assert_eq!(provider.model_name(), "fixed");
    }

    #[test]
    fn test_error_messages() {
        let err = EmbeddingError::InvalidInput("Text cannot be empty".to_string());
        assert_eq!(err.to_string(), "Invalid input text: Text cannot be empty");
    }
}
