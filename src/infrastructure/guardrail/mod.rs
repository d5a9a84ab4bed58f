//! Guardrail pipeline wiring

mod pipeline;

pub use pipeline::GuardrailPipeline;
