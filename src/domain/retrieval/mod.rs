//! Retrieval domain - vector index access

mod chunk;
mod index;
mod retriever;
mod retry;

pub use chunk::{IndexMatch, RetrievedChunk};
pub use index::VectorIndex;
pub use retriever::Retriever;
pub use retry::RetryConfig;

#[cfg(test)]
pub use index::MockVectorIndex;
