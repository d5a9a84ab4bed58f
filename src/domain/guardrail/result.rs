//! Pipeline outcome types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::TemplateMode;
use super::input::Query;
use super::output::OutputMetadata;
use super::retrieval::GuardrailTelemetry;

/// Fixed message returned when no chunk survives the retrieval guardrail
pub const NO_RELEVANT_CONTEXT_MESSAGE: &str =
    "No relevant information was found in the indexed documents for this question.";

/// Pipeline states in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Start,
    InputValidated,
    Retrieved,
    ContextBuilt,
    Generated,
    OutputValidated,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::InputValidated => "input_validated",
            Self::Retrieved => "retrieved",
            Self::ContextBuilt => "context_built",
            Self::Generated => "generated",
            Self::OutputValidated => "output_validated",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    RejectedInput,
    RetrievalError,
    NoRelevantContext,
    GenerationError,
    InvalidOutput,
    Success,
}

impl PipelineStatus {
    pub const ALL: [PipelineStatus; 6] = [
        Self::RejectedInput,
        Self::RetrievalError,
        Self::NoRelevantContext,
        Self::GenerationError,
        Self::InvalidOutput,
        Self::Success,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RejectedInput => "rejected_input",
            Self::RetrievalError => "retrieval_error",
            Self::NoRelevantContext => "no_relevant_context",
            Self::GenerationError => "generation_error",
            Self::InvalidOutput => "invalid_output",
            Self::Success => "success",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of the generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub template_mode: TemplateMode,
    pub model: String,
    pub temperature: f32,
    pub context_length: usize,
    pub prompt_length: usize,
}

/// Everything recorded on the way to the terminal status. Stages that never
/// ran leave their slot empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryBundle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Query>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<GuardrailTelemetry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Compact view of a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSummary {
    pub chunks_used: usize,
    pub threshold: f32,
    pub template_mode: TemplateMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fidelity_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_citation: Option<bool>,
    pub fidelity_warning: bool,
    pub no_context_found: bool,
}

/// The single structured outcome of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub request_id: Uuid,
    pub status: PipelineStatus,
    pub response: String,
    /// Sources of the chunks used to build the context (success only)
    pub sources: Vec<String>,
    pub telemetry: TelemetryBundle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ResultSummary>,
    pub timestamp: DateTime<Utc>,
}

impl PipelineResult {
    /// Build a terminal failure result
    pub fn failure(
        request_id: Uuid,
        status: PipelineStatus,
        response: impl Into<String>,
        telemetry: TelemetryBundle,
    ) -> Self {
        Self {
            request_id,
            status,
            response: response.into(),
            sources: Vec::new(),
            telemetry,
            summary: None,
            timestamp: Utc::now(),
        }
    }

    /// Build a successful result
    pub fn success(
        request_id: Uuid,
        response: impl Into<String>,
        sources: Vec<String>,
        telemetry: TelemetryBundle,
        summary: ResultSummary,
    ) -> Self {
        Self {
            request_id,
            status: PipelineStatus::Success,
            response: response.into(),
            sources,
            telemetry,
            summary: Some(summary),
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Sources without repeats, first occurrence order
    pub fn unique_sources(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.sources
            .iter()
            .map(String::as_str)
            .filter(|s| seen.insert(*s))
            .collect()
    }
}
