//! Single-shot answer generation over an [`LlmProvider`]

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{FinishReason, LlmProvider, LlmRequest, Usage};
use crate::domain::DomainError;

/// Text produced by one generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub answer: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    pub latency_ms: u64,
}

/// Sends a prompt as one user message. Never retried: a failed call
/// surfaces as [`DomainError::Generation`]. The completion text is returned
/// as-is, even when empty.
#[derive(Debug, Clone)]
pub struct Generator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Option<Duration>,
}

impl Generator {
    /// Deterministic generator (temperature 0) for `model`
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            timeout: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    pub async fn generate(&self, prompt: &str) -> Result<Generation, DomainError> {
        let mut builder = LlmRequest::builder()
            .user(prompt)
            .temperature(self.temperature);
        if let Some(max_tokens) = self.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        let request = builder.build();

        let start = Instant::now();
        let call = self.provider.chat(&self.model, request);

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(DomainError::timeout(
                    "generation",
                    start.elapsed().as_millis() as u64,
                )),
            },
            None => call.await,
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        let response = result.map_err(|e| {
            warn!(
                provider = self.provider.provider_name(),
                model = %self.model,
                error = %e,
                "Generation call failed"
            );
            DomainError::generation(format!("{} call failed: {}", self.provider.provider_name(), e))
        })?;

        let answer = response.content().to_string();

        debug!(
            model = %response.model,
            latency_ms,
            answer_length = answer.chars().count(),
            "Generated answer"
        );

        Ok(Generation {
            answer,
            model: response.model,
            finish_reason: response.finish_reason,
            usage: response.usage,
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::{MessageRole, MockLlmProvider};

    #[tokio::test]
    async fn test_generate_sends_single_user_message() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_content("Redis is used."));
        let generator = Generator::new(provider.clone(), "llama3");

        let generation = generator.generate("PROMPT").await.unwrap();

        assert_eq!(generation.answer, "Redis is used.");
        assert_eq!(generation.model, "llama3");
        assert_eq!(provider.call_count(), 1);

        let request = provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, MessageRole::User);
        assert_eq!(request.messages[0].content, "PROMPT");
        assert_eq!(request.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_provider_error_is_generation_error() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_error("connection refused"));
        let generator = Generator::new(provider.clone(), "llama3");

        let err = generator.generate("PROMPT").await.unwrap_err();

        assert!(matches!(err, DomainError::Generation { .. }));
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_completion_is_returned_unchanged() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_content("   "));
        let generator = Generator::new(provider, "llama3");

        let generation = generator.generate("PROMPT").await.unwrap();
        assert_eq!(generation.answer, "   ");
    }

    #[tokio::test]
    async fn test_timeout_is_generation_error() {
        let provider = Arc::new(
            MockLlmProvider::new("mock")
                .with_content("late")
                .with_delay(Duration::from_millis(200)),
        );
        let generator =
            Generator::new(provider, "llama3").with_timeout(Duration::from_millis(20));

        let err = generator.generate("PROMPT").await.unwrap_err();

        assert!(matches!(err, DomainError::Generation { .. }));
        assert!(err.to_string().contains("Timed out"));
    }
}
