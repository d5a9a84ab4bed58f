//! Retrieved chunk types

use serde::{Deserialize, Serialize};

/// A neighbor as returned by the vector index service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMatch {
    /// Chunk text
    pub content: String,
    /// Source identifier (usually a file path)
    pub source: String,
    /// Distance to the query, lower is more similar
    pub distance: f32,
}

impl IndexMatch {
    pub fn new(content: impl Into<String>, source: impl Into<String>, distance: f32) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            distance,
        }
    }
}

/// A chunk flowing through the guardrail stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub source: String,
    /// Raw distance score as reported by the index
    pub distance: f32,
    /// Set by the retrieval guardrail
    #[serde(default)]
    pub accepted: bool,
}

impl RetrievedChunk {
    pub fn new(content: impl Into<String>, source: impl Into<String>, distance: f32) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            distance,
            accepted: false,
        }
    }

    /// Mark the chunk as accepted by the guardrail
    pub fn into_accepted(mut self) -> Self {
        self.accepted = true;
        self
    }
}

impl From<IndexMatch> for RetrievedChunk {
    fn from(m: IndexMatch) -> Self {
        Self::new(m.content, m.source, m.distance)
    }
}
