use async_trait::async_trait;
use std::fmt::Debug;

use crate::domain::DomainError;

/// Turns query text into a dense vector for nearest-neighbour search
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    /// Embed a single text with `model`
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;

    /// Deterministic vectors derived from the input bytes
    #[derive(Debug)]
    pub struct MockEmbeddingProvider {
        dimensions: usize,
        error: Option<String>,
    }

    impl MockEmbeddingProvider {
        pub fn new(dimensions: usize) -> Self {
            Self {
                dimensions,
                error: None,
            }
        }

        pub fn with_error(mut self, error: impl Into<String>) -> Self {
            self.error = Some(error.into());
            self
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddingProvider {
        async fn embed(&self, _model: &str, text: &str) -> Result<Vec<f32>, DomainError> {
            if let Some(ref error) = self.error {
                return Err(DomainError::provider("mock", error));
            }

            let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_add(b as u64));
            Ok((0..self.dimensions)
                .map(|i| ((hash.wrapping_add(i as u64) % 1000) as f32 / 1000.0) - 0.5)
                .collect())
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_embeddings_are_deterministic() {
            let provider = MockEmbeddingProvider::new(8);

            let first = provider.embed("m", "redis cache").await.unwrap();
            let second = provider.embed("m", "redis cache").await.unwrap();

            assert_eq!(first.len(), 8);
            assert_eq!(first, second);
        }

        #[tokio::test]
        async fn test_mock_error() {
            let provider = MockEmbeddingProvider::new(8).with_error("down");
            assert!(provider.embed("m", "x").await.is_err());
        }
    }
}
