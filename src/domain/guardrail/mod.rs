//! Guardrail domain - validation, filtering and scoring stages

mod config;
mod context;
mod input;
mod output;
mod prompt;
mod result;
mod retrieval;

pub use config::{
    GuardrailConfig, TemplateMode, ThresholdMode, MAX_DISTANCE, THRESHOLD_BALANCED,
    THRESHOLD_PERMISSIVE, THRESHOLD_STRICT,
};
pub use context::{ContextAssembler, SOURCE_MARKER};
pub use input::{InputValidator, Query, RejectionReason};
pub use output::{
    FidelityScorer, LexicalOverlapScorer, OutputMetadata, OutputValidation, OutputValidator,
    ValidationMarker, INVALID_ANSWER_MESSAGE,
};
pub use prompt::{PromptBuilder, NOT_FOUND_SENTINEL};
pub use result::{
    GenerationMetadata, PipelineResult, PipelineStage, PipelineStatus, ResultSummary,
    TelemetryBundle, NO_RELEVANT_CONTEXT_MESSAGE,
};
pub use retrieval::{
    ChunkDecision, ChunkRejection, GuardrailOutcome, GuardrailTelemetry, RetrievalGuardrail,
    ScoreStats, MIN_MEANINGFUL_CHARS,
};
