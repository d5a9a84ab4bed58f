use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Retrieval error: {message}")]
    Retrieval { message: String },

    #[error("Generation error: {message}")]
    Generation { message: String },

    #[error("Timed out after {elapsed_ms}ms: {operation}")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("Request cancelled at stage: {stage}")]
    Cancelled { stage: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval {
            message: message.into(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_ms,
        }
    }

    pub fn cancelled(stage: impl Into<String>) -> Self {
        Self::Cancelled {
            stage: stage.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the error was produced by a cancellation request
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The message without the variant prefix, for user-facing text
    pub fn detail(&self) -> String {
        match self {
            Self::Retrieval { message } | Self::Generation { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = DomainError::validation("Invalid input");
        assert_eq!(error.to_string(), "Validation error: Invalid input");
    }

    #[test]
    fn test_provider_error() {
        let error = DomainError::provider("openai", "HTTP 500");
        assert_eq!(error.to_string(), "Provider error: openai - HTTP 500");
    }

    #[test]
    fn test_timeout_error() {
        let error = DomainError::timeout("vector index query", 1500);
        assert_eq!(
            error.to_string(),
            "Timed out after 1500ms: vector index query"
        );
    }

    #[test]
    fn test_cancelled_error() {
        let error = DomainError::cancelled("retrieved");
        assert!(error.is_cancelled());
        assert!(!DomainError::internal("boom").is_cancelled());
    }

    #[test]
    fn test_detail_strips_stage_prefix() {
        assert_eq!(DomainError::retrieval("index down").detail(), "index down");
        assert_eq!(
            DomainError::provider("openai", "HTTP 500").detail(),
            "Provider error: openai - HTTP 500"
        );
    }
}
