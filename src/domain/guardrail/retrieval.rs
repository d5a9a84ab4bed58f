//! Distance-threshold and chunk-quality filtering

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::config::GuardrailConfig;
use crate::domain::retrieval::RetrievedChunk;

/// Minimum number of characters a chunk must keep once sentence punctuation
/// and whitespace are stripped from both ends
pub const MIN_MEANINGFUL_CHARS: usize = 10;

const EDGE_PUNCTUATION: &str = ".,!?;:";

/// Why a retrieved chunk was not used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkRejection {
    /// Distance greater than the threshold
    AboveThreshold,
    /// Trimmed content shorter than the minimum chunk length
    TooShort,
    /// Mostly punctuation or whitespace
    Degenerate,
}

impl ChunkRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AboveThreshold => "above_threshold",
            Self::TooShort => "too_short",
            Self::Degenerate => "degenerate",
        }
    }
}

/// The guardrail's verdict on one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDecision {
    pub source: String,
    pub distance: f32,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<ChunkRejection>,
}

/// Min/max/mean of the retrieved distances
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

impl ScoreStats {
    /// Summarize a set of distances; `None` when empty
    pub fn from_distances(distances: &[f32]) -> Option<Self> {
        if distances.is_empty() {
            return None;
        }

        let min = distances.iter().copied().fold(f32::INFINITY, f32::min);
        let max = distances.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mean = distances.iter().sum::<f32>() / distances.len() as f32;

        Some(Self { min, max, mean })
    }
}

/// Acceptance and rejection telemetry for one filtering pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailTelemetry {
    pub threshold: f32,
    pub min_chunk_length: usize,
    pub total_retrieved: usize,
    pub total_accepted: usize,
    /// 1 - accepted/retrieved, 0 when nothing was retrieved
    pub rejection_rate: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_stats: Option<ScoreStats>,
    /// Retrieved distances in rank order
    pub distances: Vec<f32>,
    pub rejected_above_threshold: usize,
    pub rejected_too_short: usize,
    pub rejected_degenerate: usize,
    /// Per-chunk decisions in rank order
    pub decisions: Vec<ChunkDecision>,
}

impl GuardrailTelemetry {
    /// Percentage of retrieved chunks that were accepted
    pub fn acceptance_percentage(&self) -> f32 {
        if self.total_retrieved == 0 {
            0.0
        } else {
            (self.total_accepted as f32 / self.total_retrieved as f32) * 100.0
        }
    }
}

/// Result of filtering: accepted chunks (rank order preserved) and telemetry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailOutcome {
    pub accepted: Vec<RetrievedChunk>,
    pub telemetry: GuardrailTelemetry,
    pub min_chunks_required: usize,
}

impl GuardrailOutcome {
    /// Whether enough chunks survived to build a context
    pub fn is_sufficient(&self) -> bool {
        self.accepted.len() >= self.min_chunks_required
    }

    /// Source identifiers of the accepted chunks, in rank order
    pub fn sources(&self) -> Vec<String> {
        self.accepted.iter().map(|c| c.source.clone()).collect()
    }
}

/// Filters retrieved neighbors by distance threshold and content quality.
///
/// Lower thresholds reject more chunks (precision); higher thresholds let
/// more through (recall) at the cost of noisier context.
#[derive(Debug, Clone)]
pub struct RetrievalGuardrail {
    threshold: f32,
    min_chunk_length: usize,
    min_chunks_required: usize,
}

impl RetrievalGuardrail {
    pub fn new(config: &GuardrailConfig) -> Self {
        Self {
            threshold: config.threshold(),
            min_chunk_length: config.min_chunk_length,
            min_chunks_required: config.min_chunks_required,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Filter with the configured threshold and minimum chunk length
    pub fn evaluate(&self, chunks: Vec<RetrievedChunk>) -> GuardrailOutcome {
        let (accepted, telemetry) = Self::filter(chunks, self.threshold, self.min_chunk_length);

        let outcome = GuardrailOutcome {
            accepted,
            telemetry,
            min_chunks_required: self.min_chunks_required,
        };

        if !outcome.is_sufficient() {
            info!(
                accepted = outcome.accepted.len(),
                required = self.min_chunks_required,
                "Insufficient context after filtering"
            );
        }

        outcome
    }

    /// Accept chunks with `distance <= threshold` whose content passes the
    /// quality check. Order is preserved.
    pub fn filter(
        chunks: Vec<RetrievedChunk>,
        threshold: f32,
        min_len: usize,
    ) -> (Vec<RetrievedChunk>, GuardrailTelemetry) {
        let total_retrieved = chunks.len();
        let distances: Vec<f32> = chunks.iter().map(|c| c.distance).collect();
        let mut accepted = Vec::new();
        let mut decisions = Vec::with_capacity(total_retrieved);
        let (mut above, mut short, mut degenerate) = (0, 0, 0);

        for chunk in chunks {
            let rejection = if chunk.distance <= threshold {
                check_quality(&chunk.content, min_len).err()
            } else {
                Some(ChunkRejection::AboveThreshold)
            };

            match rejection {
                None => {
                    info!(
                        decision = "accepted",
                        distance = chunk.distance,
                        threshold,
                        source = %chunk.source,
                        "Chunk decision"
                    );
                }
                Some(cause) => {
                    match cause {
                        ChunkRejection::AboveThreshold => above += 1,
                        ChunkRejection::TooShort => short += 1,
                        ChunkRejection::Degenerate => degenerate += 1,
                    }
                    info!(
                        decision = "rejected",
                        cause = cause.as_str(),
                        distance = chunk.distance,
                        threshold,
                        source = %chunk.source,
                        "Chunk decision"
                    );
                }
            }

            decisions.push(ChunkDecision {
                source: chunk.source.clone(),
                distance: chunk.distance,
                accepted: rejection.is_none(),
                rejection,
            });

            if rejection.is_none() {
                accepted.push(chunk.into_accepted());
            }
        }

        let total_accepted = accepted.len();
        let rejection_rate = if total_retrieved == 0 {
            0.0
        } else {
            (total_retrieved - total_accepted) as f32 / total_retrieved as f32
        };

        let telemetry = GuardrailTelemetry {
            threshold,
            min_chunk_length: min_len,
            total_retrieved,
            total_accepted,
            rejection_rate,
            score_stats: ScoreStats::from_distances(&distances),
            distances,
            rejected_above_threshold: above,
            rejected_too_short: short,
            rejected_degenerate: degenerate,
            decisions,
        };

        info!(
            threshold,
            retrieved = total_retrieved,
            accepted = total_accepted,
            rejection_rate,
            "Retrieval guardrail applied"
        );
        debug!(score_stats = ?telemetry.score_stats, "Distance distribution");

        (accepted, telemetry)
    }
}

/// Reject chunks that are too short or carry no meaningful text
fn check_quality(content: &str, min_len: usize) -> Result<(), ChunkRejection> {
    let trimmed = content.trim();

    if trimmed.chars().count() < min_len {
        return Err(ChunkRejection::TooShort);
    }

    let meaningful = trimmed
        .trim_matches(|c: char| c.is_whitespace() || EDGE_PUNCTUATION.contains(c))
        .chars()
        .count();

    if meaningful < MIN_MEANINGFUL_CHARS {
        return Err(ChunkRejection::Degenerate);
    }

    Ok(())
}
