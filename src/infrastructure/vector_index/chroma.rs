//! Chroma vector index over its REST API
//!
//! Query text is embedded client-side and sent as `query_embeddings`, so the
//! embedding model must match the one used when the collection was built.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::domain::{DomainError, EmbeddingProvider, IndexMatch, VectorIndex};
use crate::infrastructure::http_client::HttpClientTrait;

/// Metadata key holding the chunk's origin
const SOURCE_KEY: &str = "source";
const UNKNOWN_SOURCE: &str = "unknown";

#[derive(Debug)]
pub struct ChromaVectorIndex<C: HttpClientTrait> {
    client: C,
    base_url: String,
    collection: String,
    collection_id: OnceCell<String>,
    embedder: Arc<dyn EmbeddingProvider>,
    embedding_model: String,
}

impl<C: HttpClientTrait> ChromaVectorIndex<C> {
    pub fn new(
        client: C,
        base_url: impl Into<String>,
        collection: impl Into<String>,
        embedder: Arc<dyn EmbeddingProvider>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            collection_id: OnceCell::new(),
            embedder,
            embedding_model: embedding_model.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![("Content-Type", "application/json")]
    }

    /// Resolve the collection name to its id once, then reuse it
    async fn collection_id(&self) -> Result<&str, DomainError> {
        self.collection_id
            .get_or_try_init(|| async {
                let url = format!("{}/api/v1/collections/{}", self.base_url, self.collection);
                let json = self.client.get_json(&url, self.headers()).await?;

                let id = json
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        DomainError::provider(
                            "chroma",
                            format!("Collection '{}' has no id", self.collection),
                        )
                    })?
                    .to_string();

                debug!(collection = %self.collection, id = %id, "Resolved Chroma collection");
                Ok::<_, DomainError>(id)
            })
            .await
            .map(String::as_str)
    }

    fn parse_matches(json: Value) -> Result<Vec<IndexMatch>, DomainError> {
        let response: QueryResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider("chroma", format!("Failed to parse query response: {}", e))
        })?;

        // One query embedding was sent, so only the first row is relevant
        let documents = response.documents.into_iter().next().unwrap_or_default();
        let distances = response.distances.into_iter().next().unwrap_or_default();
        let metadatas = response.metadatas.into_iter().next().unwrap_or_default();

        if documents.len() != distances.len() {
            return Err(DomainError::provider(
                "chroma",
                format!(
                    "Mismatched result lengths: {} documents, {} distances",
                    documents.len(),
                    distances.len()
                ),
            ));
        }

        Ok(documents
            .into_iter()
            .zip(distances)
            .enumerate()
            .map(|(i, (document, distance))| {
                let source = metadatas
                    .get(i)
                    .and_then(Option::as_ref)
                    .and_then(|m| m.get(SOURCE_KEY))
                    .and_then(Value::as_str)
                    .unwrap_or(UNKNOWN_SOURCE);

                IndexMatch::new(document.unwrap_or_default(), source, distance)
            })
            .collect())
    }
}

#[async_trait]
impl<C: HttpClientTrait> VectorIndex for ChromaVectorIndex<C> {
    async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexMatch>, DomainError> {
        let embedding = self.embedder.embed(&self.embedding_model, text).await?;
        let collection_id = self.collection_id().await?;

        let url = format!("{}/api/v1/collections/{}/query", self.base_url, collection_id);
        let body = serde_json::json!({
            "query_embeddings": [embedding],
            "n_results": k,
            "include": ["documents", "metadatas", "distances"],
        });

        let json = self.client.post_json(&url, self.headers(), &body).await?;
        Self::parse_matches(json)
    }

    fn index_name(&self) -> &'static str {
        "chroma"
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Vec<Vec<Option<serde_json::Map<String, Value>>>>,
    #[serde(default)]
    distances: Vec<Vec<f32>>,
}
