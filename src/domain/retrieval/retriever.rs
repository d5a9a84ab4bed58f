//! Retriever adapter over the vector index

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::{debug, warn};

use super::chunk::{IndexMatch, RetrievedChunk};
use super::index::VectorIndex;
use super::retry::RetryConfig;
use crate::domain::DomainError;

/// Wraps a [`VectorIndex`], bounding each call with a timeout and retrying
/// transient failures according to its [`RetryConfig`].
///
/// Results are returned unfiltered, ordered best-first.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    timeout: Option<Duration>,
    retry: RetryConfig,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("index", &self.index.index_name())
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Retriever {
    /// Create a retriever with no timeout and no retries
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self {
            index,
            timeout: None,
            retry: RetryConfig::disabled(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn index_name(&self) -> &'static str {
        self.index.index_name()
    }

    /// Fetch the `k` nearest chunks, ascending by distance
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>, DomainError> {
        if k == 0 {
            return Err(DomainError::validation("k must be greater than 0"));
        }

        let max_attempts = self.retry.max_attempts();
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.retry.delay_for_attempt(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying retrieval");
                tokio::time::sleep(delay).await;
            }

            match self.try_query(query, k).await {
                Ok(matches) => {
                    let mut chunks: Vec<RetrievedChunk> =
                        matches.into_iter().map(RetrievedChunk::from).collect();
                    chunks.sort_by(|a, b| a.distance.total_cmp(&b.distance));

                    debug!(
                        index = self.index.index_name(),
                        retrieved = chunks.len(),
                        attempts = attempt + 1,
                        "Retrieved chunks"
                    );
                    return Ok(chunks);
                }
                Err(e) => {
                    warn!(
                        index = self.index.index_name(),
                        attempt = attempt + 1,
                        error = %e,
                        "Retrieval attempt failed"
                    );
                    let retryable = is_retryable(&e);
                    last_error = Some(e);

                    if !retryable {
                        break;
                    }
                }
            }
        }

        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts were made".to_string());

        Err(DomainError::retrieval(format!(
            "{} query failed: {}",
            self.index.index_name(),
            message
        )))
    }

    async fn try_query(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<IndexMatch>, DomainError> {
        let future = self.index.query(query, k);

        match self.timeout {
            Some(limit) => {
                let start = Instant::now();
                match timeout(limit, future).await {
                    Ok(result) => result,
                    Err(_) => Err(DomainError::timeout(
                        "vector index query",
                        start.elapsed().as_millis() as u64,
                    )),
                }
            }
            None => future.await,
        }
    }
}

/// Configuration and validation problems will not go away on retry
fn is_retryable(error: &DomainError) -> bool {
    !matches!(
        error,
        DomainError::Configuration { .. } | DomainError::Validation { .. }
    )
}
