//! RAG Guardrails
//!
//! Grounded question answering over a vector index, with guardrails on:
//! - Input (length, truncation, instruction-override deny-list)
//! - Retrieval (distance threshold, chunk length, degenerate content)
//! - Output (not-found sentinel, source citation, lexical fidelity)

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{DomainError, PipelineResult, PipelineStatus};
pub use infrastructure::GuardrailPipeline;
