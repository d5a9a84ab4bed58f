//! Vector index service trait

use async_trait::async_trait;

use super::chunk::IndexMatch;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Nearest-neighbor lookup over an external vector index.
///
/// Implementations only translate between the service and [`IndexMatch`];
/// they must not filter or re-rank.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `k` neighbors of `text`
    async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexMatch>, DomainError>;

    /// Get the index backend name
    fn index_name(&self) -> &'static str;
}
