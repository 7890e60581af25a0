//! JSON file paper provider.
//!
//! Reads a JSON array of papers (the same shape `Paper` serializes to) from
//! disk. Used for offline digest runs and for replaying a saved fetch.
//!
//! The catalog query string is not interpreted; only the cutoff and category
//! filters of a [`PaperQuery`] apply.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use super::{PaperProvider, PaperQuery, ProviderError, ProviderResult};
use crate::models::Paper;

/// Paper provider serving papers loaded from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFilePaperProvider {
    papers: Vec<Paper>,
}

impl JsonFilePaperProvider {
    /// Load papers from `path`.
    ///
    /// # Errors
    /// Returns `ProviderError::IoError` if the file cannot be read and
    /// `ProviderError::ParseError` if it is not a JSON array of papers
    pub async fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let papers: Vec<Paper> = serde_json::from_str(&content).map_err(|e| {
            ProviderError::ParseError(format!("{}: {}", path.display(), e))
        })?;

        debug!("Loaded {} papers from {}", papers.len(), path.display());
        Ok(Self { papers })
    }

    /// Serve an in-memory list of papers.
    pub fn from_papers(papers: Vec<Paper>) -> Self {
        Self { papers }
    }

    /// Number of papers loaded, before any filtering.
    pub fn len(&self) -> usize {
        self.papers.len()
    }

    /// Whether the source holds no papers at all.
    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }
}

#[async_trait]
impl PaperProvider for JsonFilePaperProvider {
    async fn fetch_papers(&self, query: &PaperQuery) -> ProviderResult<Vec<Paper>> {
        Ok(self
            .papers
            .iter()
            .filter(|paper| query.matches(paper))
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "JSON file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Write;

    const PAPERS: &str = r#"[
  {
    "id": "2301.00001",
    "title": "Deep Learning for Robotic Grasping",
    "authors": ["John Doe", "Jane Smith"],
    "abstract": "We present a novel approach for robotic grasping.",
    "url": "https://arxiv.org/abs/2301.00001",
    "pdf_url": "https://arxiv.org/pdf/2301.00001",
    "published": "2023-01-01T00:00:00Z",
    "categories": ["cs.RO", "cs.LG"],
    "primary_category": "cs.RO"
  },
  {
    "id": "2301.00002",
    "title": "3D Scene Reconstruction from RGB-D Images",
    "authors": ["Alice Brown"],
    "abstract": "We propose a method for 3D scene reconstruction.",
    "url": "https://arxiv.org/abs/2301.00002",
    "published": "2023-01-02T00:00:00+00:00",
    "categories": ["cs.CV"]
  }
]"#;

    fn write_fixture(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_and_fetch_all() {
        let file = write_fixture(PAPERS);
        let provider = JsonFilePaperProvider::from_file(file.path()).await.unwrap();
        assert_eq!(provider.len(), 2);

        let papers = provider.fetch_papers(&PaperQuery::new("")).await.unwrap();
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].id, "2301.00001");
        assert!(papers[1].pdf_url.is_none());
    }

    #[tokio::test]
    async fn test_fetch_applies_filters() {
        let provider = JsonFilePaperProvider::from_file(write_fixture(PAPERS).path())
            .await
            .unwrap();

        let by_category = PaperQuery::new("").with_categories(vec!["cs.CV".into()]);
        let papers = provider.fetch_papers(&by_category).await.unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].id, "2301.00002");

        let cutoff = Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap();
        let by_date = PaperQuery::new("").with_cutoff(cutoff);
        let papers = provider.fetch_papers(&by_date).await.unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].id, "2301.00002");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = JsonFilePaperProvider::from_file("/nonexistent/papers.json").await;
        assert!(matches!(result, Err(ProviderError::IoError(_))));
    }

    #[tokio::test]
    async fn test_malformed_file() {
        let file = write_fixture("{\"not\": \"a list\"}");
        match JsonFilePaperProvider::from_file(file.path()).await {
            Err(ProviderError::ParseError(msg)) => {
                assert!(msg.contains(&file.path().display().to_string()))
            }
            other => panic!("Expected ParseError, got {:?}", other.map(|p| p.len())),
        }
    }
}
