//! Generated answer validation

use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::config::GuardrailConfig;
use super::prompt::NOT_FOUND_SENTINEL;

/// Message returned in place of an answer that failed validation
pub const INVALID_ANSWER_MESSAGE: &str = "Answer too short or empty";

static SOURCE_CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[Ss]ource:").expect("citation pattern is valid"));

/// Estimates how much of an answer is traceable to the context.
///
/// Scores must lie in [0, 1] and be deterministic for identical inputs.
pub trait FidelityScorer: Send + Sync + Debug {
    fn score(&self, answer: &str, context: &str) -> f32;

    /// Get the scorer name
    fn scorer_name(&self) -> &'static str;
}

/// Share of distinct answer words that also occur in the context.
///
/// Words are lowercased whitespace-separated tokens, punctuation included.
/// A lexical heuristic only; it says nothing about entailment.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalOverlapScorer;

impl LexicalOverlapScorer {
    fn words(text: &str) -> HashSet<String> {
        text.split_whitespace().map(str::to_lowercase).collect()
    }
}

impl FidelityScorer for LexicalOverlapScorer {
    fn score(&self, answer: &str, context: &str) -> f32 {
        let answer_words = Self::words(answer);

        if answer_words.is_empty() {
            return 0.0;
        }

        let context_words = Self::words(context);
        let overlap = answer_words.intersection(&context_words).count();

        overlap as f32 / answer_words.len() as f32
    }

    fn scorer_name(&self) -> &'static str {
        "lexical_overlap"
    }
}

/// Outcome classification of output validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMarker {
    Valid,
    /// The generator judged the supplied context insufficient
    NoContextFound,
    Rejected,
}

/// Inspection data recorded by the output validator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputMetadata {
    pub marker: ValidationMarker,
    pub original_length: usize,
    pub context_length: usize,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_citation_present: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fidelity_score: Option<f32>,
    pub fidelity_warning: bool,
    pub scorer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub validated_at: DateTime<Utc>,
}

/// Result of validating one answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputValidation {
    pub ok: bool,
    pub final_answer: String,
    pub metadata: OutputMetadata,
}

/// Checks length, the not-found sentinel, citation presence and fidelity
#[derive(Debug, Clone)]
pub struct OutputValidator {
    scorer: Arc<dyn FidelityScorer>,
    min_answer_length: usize,
    warning_threshold: f32,
}

impl OutputValidator {
    /// Create a validator using [`LexicalOverlapScorer`]
    pub fn new(config: &GuardrailConfig) -> Self {
        Self::with_scorer(config, Arc::new(LexicalOverlapScorer))
    }

    pub fn with_scorer(config: &GuardrailConfig, scorer: Arc<dyn FidelityScorer>) -> Self {
        Self {
            scorer,
            min_answer_length: config.min_answer_length,
            warning_threshold: config.fidelity_warning_threshold,
        }
    }

    pub fn validate(&self, answer: &str, context: &str, query: &str) -> OutputValidation {
        let mut metadata = OutputMetadata {
            marker: ValidationMarker::Valid,
            original_length: answer.chars().count(),
            context_length: context.chars().count(),
            query: query.to_string(),
            source_citation_present: None,
            fidelity_score: None,
            fidelity_warning: false,
            scorer: self.scorer.scorer_name().to_string(),
            rejection_reason: None,
            validated_at: Utc::now(),
        };

        let trimmed = answer.trim();

        if trimmed.chars().count() < self.min_answer_length {
            warn!(
                length = trimmed.chars().count(),
                min_length = self.min_answer_length,
                "Answer rejected: too short"
            );
            metadata.marker = ValidationMarker::Rejected;
            metadata.rejection_reason = Some(format!(
                "answer shorter than {} characters",
                self.min_answer_length
            ));
            return OutputValidation {
                ok: false,
                final_answer: INVALID_ANSWER_MESSAGE.to_string(),
                metadata,
            };
        }

        if trimmed.contains(NOT_FOUND_SENTINEL) {
            info!(marker = "no_context_found", "Generator reported missing answer");
            metadata.marker = ValidationMarker::NoContextFound;
            return OutputValidation {
                ok: true,
                final_answer: answer.to_string(),
                metadata,
            };
        }

        let citation = has_source_citation(trimmed);
        if !citation {
            warn!("Answer has no source citation");
        }
        metadata.source_citation_present = Some(citation);

        let fidelity = self.scorer.score(answer, context).clamp(0.0, 1.0);
        metadata.fidelity_score = Some(fidelity);

        if fidelity < self.warning_threshold {
            warn!(fidelity, threshold = self.warning_threshold, "Low fidelity to context");
            metadata.fidelity_warning = true;
        }

        info!(
            marker = "valid",
            fidelity,
            citation,
            "Answer validated"
        );

        OutputValidation {
            ok: true,
            final_answer: answer.to_string(),
            metadata,
        }
    }
}

/// Matches a `Source:` or `source:` attribution starting at a word boundary
fn has_source_citation(answer: &str) -> bool {
    SOURCE_CITATION.is_match(answer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTEXT: &str = "[1] The system uses Redis as a distributed cache.\n(Source: cache.md)";

    fn validator() -> OutputValidator {
        OutputValidator::new(&GuardrailConfig::default())
    }

    #[test]
    fn test_short_answer_rejected() {
        let result = validator().validate("Redis", CONTEXT, "cache?");

        assert!(!result.ok);
        assert_eq!(result.final_answer, INVALID_ANSWER_MESSAGE);
        assert_eq!(result.metadata.marker, ValidationMarker::Rejected);
        assert!(result.metadata.fidelity_score.is_none());
    }

    #[test]
    fn test_whitespace_padding_does_not_count() {
        let result = validator().validate("   Redis      ", CONTEXT, "cache?");
        assert!(!result.ok);
    }

    #[test]
    fn test_sentinel_is_successful_no_context_found() {
        let result = validator().validate(NOT_FOUND_SENTINEL, CONTEXT, "unicorns?");

        assert!(result.ok);
        assert_eq!(result.final_answer, NOT_FOUND_SENTINEL);
        assert_eq!(result.metadata.marker, ValidationMarker::NoContextFound);
        assert!(result.metadata.fidelity_score.is_none());
    }

    #[test]
    fn test_grounded_answer_with_citation() {
        let answer = "The system uses Redis as a distributed cache. (Source: cache.md)";
        let result = validator().validate(answer, CONTEXT, "cache?");

        assert!(result.ok);
        assert_eq!(result.final_answer, answer);
        assert_eq!(result.metadata.marker, ValidationMarker::Valid);
        assert_eq!(result.metadata.source_citation_present, Some(true));
        assert_eq!(result.metadata.fidelity_score, Some(1.0));
        assert!(!result.metadata.fidelity_warning);
    }

    #[test]
    fn test_low_fidelity_warns_but_accepts() {
        let answer = "Kubernetes orchestrates containers across many nodes";
        let result = validator().validate(answer, CONTEXT, "cache?");

        assert!(result.ok);
        assert_eq!(result.metadata.fidelity_score, Some(0.0));
        assert!(result.metadata.fidelity_warning);
        assert_eq!(result.metadata.source_citation_present, Some(false));
    }

    #[test]
    fn test_fidelity_bounds() {
        let scorer = LexicalOverlapScorer;

        assert_eq!(scorer.score("redis cache", "Redis is a cache"), 1.0);
        assert_eq!(scorer.score("kafka queue", "Redis is a cache"), 0.0);
        assert_eq!(scorer.score("redis queue", "Redis is a cache"), 0.5);
        assert_eq!(scorer.score("", "Redis is a cache"), 0.0);
        assert_eq!(scorer.score("... ---", "Redis"), 0.0);
    }

    #[test]
    fn test_fidelity_keeps_punctuation_in_words() {
        let scorer = LexicalOverlapScorer;
        assert_eq!(scorer.score("Redis.", "Redis is the cache"), 0.0);
        assert_eq!(scorer.score("REDIS is", "redis is"), 1.0);
    }

    #[test]
    fn test_citation_requires_source_word() {
        let cited = "Redis handles the session cache. (source: cache.md)";
        let result = validator().validate(cited, CONTEXT, "cache?");
        assert_eq!(result.metadata.source_citation_present, Some(true));

        for answer in [
            "The resource: Redis cluster handles caching.",
            "Configured through the datasource: redis-main entry.",
            "SOURCE: cache.md says Redis handles caching.",
        ] {
            let result = validator().validate(answer, CONTEXT, "cache?");
            assert_eq!(result.metadata.source_citation_present, Some(false), "{answer}");
        }
    }

    #[test]
    fn test_fidelity_uses_distinct_words() {
        let scorer = LexicalOverlapScorer;
        assert_eq!(scorer.score("redis redis redis kafka", "redis"), 0.5);
    }

    #[test]
    fn test_validation_is_deterministic() {
        let answer = "Redis provides the cache layer, Kafka the queue. Source: cache.md";
        let first = validator().validate(answer, CONTEXT, "cache?");
        let second = validator().validate(answer, CONTEXT, "cache?");

        assert_eq!(first.ok, second.ok);
        assert_eq!(first.metadata.fidelity_score, second.metadata.fidelity_score);
        assert_eq!(
            first.metadata.source_citation_present,
            second.metadata.source_citation_present
        );
    }

    #[derive(Debug)]
    struct FixedScorer(f32);

    impl FidelityScorer for FixedScorer {
        fn score(&self, _answer: &str, _context: &str) -> f32 {
            self.0
        }

        fn scorer_name(&self) -> &'static str {
            "fixed"
        }
    }

    #[test]
    fn test_pluggable_scorer_is_clamped() {
        let validator =
            OutputValidator::with_scorer(&GuardrailConfig::default(), Arc::new(FixedScorer(3.0)));
        let result = validator.validate("A sufficiently long answer.", CONTEXT, "q");

        assert_eq!(result.metadata.fidelity_score, Some(1.0));
        assert_eq!(result.metadata.scorer, "fixed");
    }
}
