//! Context string assembly

use crate::domain::retrieval::RetrievedChunk;

/// Prefix of the source attribution line written after every chunk
pub const SOURCE_MARKER: &str = "(Source:";

/// Formats accepted chunks as numbered, source-attributed blocks:
///
/// ```text
/// [1] <content>
/// (Source: <source>)
///
/// [2] <content>
/// (Source: <source>)
/// ```
///
/// Order is kept exactly as given; nothing is deduplicated here.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAssembler;

impl ContextAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(&self, chunks: &[RetrievedChunk]) -> String {
        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                format!(
                    "[{}] {}\n{} {})",
                    i + 1,
                    chunk.content.trim(),
                    SOURCE_MARKER,
                    chunk.source
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
