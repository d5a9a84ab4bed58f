//! Infrastructure layer - External service adapters, wiring and telemetry

pub mod embedding;
pub mod guardrail;
pub mod http_client;
pub mod llm;
pub mod logging;
pub mod metrics;
pub mod vector_index;

pub use guardrail::GuardrailPipeline;
pub use http_client::{HttpClient, HttpClientTrait};
