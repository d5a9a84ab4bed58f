//! Domain layer - Guardrail stages, retrieval and generation abstractions

pub mod embedding;
pub mod error;
pub mod guardrail;
pub mod llm;
pub mod retrieval;

pub use embedding::EmbeddingProvider;
pub use error::DomainError;
pub use guardrail::{
    ContextAssembler, GuardrailConfig, InputValidator, OutputValidator, PipelineResult,
    PipelineStatus, PromptBuilder, Query, RetrievalGuardrail, TemplateMode, ThresholdMode,
};
pub use llm::{
    FinishReason, Generation, Generator, LlmProvider, LlmRequest, LlmRequestBuilder, LlmResponse,
    Message, MessageRole, Usage,
};
pub use retrieval::{IndexMatch, RetrievedChunk, Retriever, RetryConfig, VectorIndex};
