//! Guardrail configuration types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Distance cutoff for the strict preset (maximum precision)
pub const THRESHOLD_STRICT: f32 = 0.25;
/// Distance cutoff for the balanced preset
pub const THRESHOLD_BALANCED: f32 = 0.35;
/// Distance cutoff for the permissive preset (maximum recall)
pub const THRESHOLD_PERMISSIVE: f32 = 0.50;

/// Upper bound of the documented cosine distance range
pub const MAX_DISTANCE: f32 = 2.0;

/// Named distance threshold presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Smallest cutoff, rejects the most chunks
    Strict,
    #[default]
    Balanced,
    /// Largest cutoff, accepts the most chunks
    Permissive,
}

impl ThresholdMode {
    /// All presets, strictest first
    pub const ALL: [ThresholdMode; 3] = [Self::Strict, Self::Balanced, Self::Permissive];

    /// Distance cutoff for this preset
    pub fn threshold(&self) -> f32 {
        match self {
            Self::Strict => THRESHOLD_STRICT,
            Self::Balanced => THRESHOLD_BALANCED,
            Self::Permissive => THRESHOLD_PERMISSIVE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Balanced => "balanced",
            Self::Permissive => "permissive",
        }
    }
}

impl fmt::Display for ThresholdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "balanced" => Ok(Self::Balanced),
            "permissive" => Ok(Self::Permissive),
            other => Err(DomainError::configuration(format!(
                "Unknown threshold mode '{}' (expected strict, balanced or permissive)",
                other
            ))),
        }
    }
}

/// Prompt template selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TemplateMode {
    /// Answer exclusively from the supplied context
    #[default]
    Strict,
    /// Context first, limited supplementary general knowledge allowed
    Balanced,
}

impl TemplateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Balanced => "balanced",
        }
    }
}

impl fmt::Display for TemplateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "balanced" => Ok(Self::Balanced),
            other => Err(DomainError::configuration(format!(
                "Unknown template mode '{}' (expected strict or balanced)",
                other
            ))),
        }
    }
}

/// Configuration shared by every guardrail stage.
///
/// Built once at startup and handed to each component by value; nothing in
/// request handling mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Preset distance cutoff
    #[serde(default)]
    pub threshold_mode: ThresholdMode,
    /// Overrides the preset cutoff when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_threshold: Option<f32>,
    /// Prompt template used for generation
    #[serde(default)]
    pub template_mode: TemplateMode,
    /// Minimum trimmed chunk length to accept
    #[serde(default = "default_min_chunk_length")]
    pub min_chunk_length: usize,
    /// Number of neighbors requested from the index (k)
    #[serde(default = "default_max_chunks_retrieved")]
    pub max_chunks_retrieved: usize,
    /// Minimum accepted chunks before generation is attempted
    #[serde(default = "default_min_chunks_required")]
    pub min_chunks_required: usize,
    /// Minimum query length in characters
    #[serde(default = "default_min_query_length")]
    pub min_query_length: usize,
    /// Queries longer than this are truncated
    #[serde(default = "default_max_query_length")]
    pub max_query_length: usize,
    /// Instruction-override phrases rejected by the input validator
    #[serde(default = "default_deny_list")]
    pub deny_list: Vec<String>,
    /// Fidelity below this value raises a warning
    #[serde(default = "default_fidelity_warning_threshold")]
    pub fidelity_warning_threshold: f32,
    /// Minimum trimmed answer length accepted by the output validator
    #[serde(default = "default_min_answer_length")]
    pub min_answer_length: usize,
}

fn default_min_chunk_length() -> usize {
    50
}

fn default_max_chunks_retrieved() -> usize {
    12
}

fn default_min_chunks_required() -> usize {
    1
}

fn default_min_query_length() -> usize {
    3
}

fn default_max_query_length() -> usize {
    500
}

fn default_deny_list() -> Vec<String> {
    [
        "ignore previous instructions",
        "forget everything",
        "act as",
        "pretend to be",
        "system:",
        "assistant:",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_fidelity_warning_threshold() -> f32 {
    0.3
}

fn default_min_answer_length() -> usize {
    10
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            threshold_mode: ThresholdMode::default(),
            custom_threshold: None,
            template_mode: TemplateMode::default(),
            min_chunk_length: default_min_chunk_length(),
            max_chunks_retrieved: default_max_chunks_retrieved(),
            min_chunks_required: default_min_chunks_required(),
            min_query_length: default_min_query_length(),
            max_query_length: default_max_query_length(),
            deny_list: default_deny_list(),
            fidelity_warning_threshold: default_fidelity_warning_threshold(),
            min_answer_length: default_min_answer_length(),
        }
    }
}

impl GuardrailConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the threshold preset
    pub fn with_threshold_mode(mut self, mode: ThresholdMode) -> Self {
        self.threshold_mode = mode;
        self
    }

    /// Override the preset with a custom distance cutoff
    pub fn with_custom_threshold(mut self, threshold: f32) -> Self {
        self.custom_threshold = Some(threshold);
        self
    }

    /// Set the prompt template
    pub fn with_template_mode(mut self, mode: TemplateMode) -> Self {
        self.template_mode = mode;
        self
    }

    pub fn with_min_chunk_length(mut self, length: usize) -> Self {
        self.min_chunk_length = length;
        self
    }

    pub fn with_max_chunks_retrieved(mut self, k: usize) -> Self {
        self.max_chunks_retrieved = k;
        self
    }

    pub fn with_min_chunks_required(mut self, min: usize) -> Self {
        self.min_chunks_required = min;
        self
    }

    /// Replace the deny-list of instruction-override phrases
    pub fn with_deny_list(mut self, phrases: Vec<String>) -> Self {
        self.deny_list = phrases;
        self
    }

    /// Distance cutoff in effect: the custom value when present, else the preset
    pub fn threshold(&self) -> f32 {
        self.custom_threshold
            .unwrap_or_else(|| self.threshold_mode.threshold())
    }

    /// Check the configuration for values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), DomainError> {
        let threshold = self.threshold();

        if !threshold.is_finite() || !(0.0..=MAX_DISTANCE).contains(&threshold) {
            return Err(DomainError::configuration(format!(
                "Distance threshold must be within [0, {}], got {}",
                MAX_DISTANCE, threshold
            )));
        }

        if self.max_chunks_retrieved == 0 {
            return Err(DomainError::configuration(
                "max_chunks_retrieved must be greater than 0",
            ));
        }

        if self.min_chunks_required == 0 {
            return Err(DomainError::configuration(
                "min_chunks_required must be at least 1",
            ));
        }

        if self.min_query_length > self.max_query_length {
            return Err(DomainError::configuration(
                "min_query_length cannot exceed max_query_length",
            ));
        }

        if !(0.0..=1.0).contains(&self.fidelity_warning_threshold) {
            return Err(DomainError::configuration(
                "fidelity_warning_threshold must be within [0, 1]",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GuardrailConfig::default();

        assert_eq!(config.threshold_mode, ThresholdMode::Balanced);
        assert_eq!(config.template_mode, TemplateMode::Strict);
        assert_eq!(config.min_chunk_length, 50);
        assert_eq!(config.max_chunks_retrieved, 12);
        assert_eq!(config.min_chunks_required, 1);
        assert_eq!(config.threshold(), 0.35);
        assert_eq!(config.deny_list.len(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_ordered() {
        assert!(ThresholdMode::Strict.threshold() < ThresholdMode::Balanced.threshold());
        assert!(ThresholdMode::Balanced.threshold() < ThresholdMode::Permissive.threshold());
    }

    #[test]
    fn test_custom_threshold_overrides_preset() {
        let config = GuardrailConfig::new()
            .with_threshold_mode(ThresholdMode::Strict)
            .with_custom_threshold(0.42);

        assert_eq!(config.threshold(), 0.42);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("STRICT".parse::<ThresholdMode>().unwrap(), ThresholdMode::Strict);
        assert_eq!(
            " permissive ".parse::<ThresholdMode>().unwrap(),
            ThresholdMode::Permissive
        );
        assert!("loose".parse::<ThresholdMode>().is_err());

        assert_eq!("balanced".parse::<TemplateMode>().unwrap(), TemplateMode::Balanced);
        assert!("permissive".parse::<TemplateMode>().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let config = GuardrailConfig::new().with_custom_threshold(2.5);
        assert!(config.validate().is_err());

        let config = GuardrailConfig::new().with_custom_threshold(f32::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_counts() {
        assert!(GuardrailConfig::new()
            .with_max_chunks_retrieved(0)
            .validate()
            .is_err());
        assert!(GuardrailConfig::new()
            .with_min_chunks_required(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: GuardrailConfig =
            serde_json::from_str(r#"{"threshold_mode": "permissive"}"#).unwrap();

        assert_eq!(config.threshold_mode, ThresholdMode::Permissive);
        assert_eq!(config.threshold(), 0.5);
        assert_eq!(config.min_chunk_length, 50);
    }
}
