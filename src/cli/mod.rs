//! Command-line interface
//!
//! - `rag-guardrails "<question>"`: answer one question
//! - `rag-guardrails --test`: run the fixed query set under every threshold preset

pub mod batch;
pub mod query;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::{
    DomainError, Generator, PipelineStatus, Retriever, TemplateMode, ThresholdMode,
};
use crate::infrastructure::embedding::OpenAiEmbeddingProvider;
use crate::infrastructure::llm::OpenAiProvider;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::metrics::init_metrics;
use crate::infrastructure::vector_index::ChromaVectorIndex;
use crate::infrastructure::{GuardrailPipeline, HttpClient};

/// Grounded question answering over a Chroma collection with retrieval guardrails
#[derive(Debug, Parser)]
#[command(name = "rag-guardrails")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Question to answer
    #[arg(required_unless_present = "test")]
    pub query: Option<String>,

    /// Distance threshold preset: strict (0.25), balanced (0.35), permissive (0.50)
    #[arg(long)]
    pub threshold_mode: Option<ThresholdMode>,

    /// Response template: strict (context only) or balanced
    #[arg(long)]
    pub template_mode: Option<TemplateMode>,

    /// Custom distance threshold, overrides the preset
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Run the built-in query set through all three presets
    #[arg(long, conflicts_with = "query")]
    pub test: bool,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Include per-chunk decisions and validation metadata
    #[arg(long)]
    pub detailed: bool,

    /// Print collected metrics in Prometheus text format at exit
    #[arg(long)]
    pub metrics: bool,
}

impl Cli {
    /// Fold command-line overrides into the loaded configuration
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(mode) = self.threshold_mode {
            config.guardrail.threshold_mode = mode;
        }
        if let Some(mode) = self.template_mode {
            config.guardrail.template_mode = mode;
        }
        if let Some(threshold) = self.threshold {
            config.guardrail.custom_threshold = Some(threshold);
        }
    }
}

/// Entry point shared by the binary
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    init_logging(&config.logging)?;
    let metrics = if cli.metrics { init_metrics() } else { None };

    let code = if cli.test {
        batch::run(&config, cli.json).await?
    } else {
        let question = cli.query.as_deref().unwrap_or_default();
        query::run(&config, question, cli.json, cli.detailed).await?
    };

    if let Some(metrics) = metrics {
        println!("\n{}", metrics.render());
    }

    Ok(code)
}

/// Wire the HTTP adapters described by `config` into a pipeline
pub fn build_pipeline(config: &AppConfig) -> Result<GuardrailPipeline, DomainError> {
    let index_timeout = config.vector_index.timeout();

    let embedder = OpenAiEmbeddingProvider::new(
        HttpClient::with_timeout(index_timeout)?,
        &config.embedding.base_url,
        config.embedding.api_key.as_deref(),
    );
    let index = ChromaVectorIndex::new(
        HttpClient::with_timeout(index_timeout)?,
        &config.vector_index.base_url,
        &config.vector_index.collection,
        Arc::new(embedder),
        &config.embedding.model,
    );
    let retriever = Retriever::new(Arc::new(index))
        .with_timeout(index_timeout)
        .with_retry(config.retrieval_retry.clone());

    let llm = OpenAiProvider::new(
        HttpClient::with_timeout(config.llm.timeout())?,
        &config.llm.base_url,
        config.llm.api_key.as_deref(),
    );
    let mut generator = Generator::new(Arc::new(llm), &config.llm.model)
        .with_temperature(config.llm.temperature)
        .with_timeout(config.llm.timeout());
    if let Some(max_tokens) = config.llm.max_tokens {
        generator = generator.with_max_tokens(max_tokens);
    }

    info!(
        collection = %config.vector_index.collection,
        model = %config.llm.model,
        threshold = config.guardrail.threshold(),
        "Pipeline ready"
    );

    GuardrailPipeline::new(config.guardrail.clone(), retriever, generator)
}

/// Infrastructure failures exit non-zero; guardrail outcomes do not
pub fn is_unrecoverable(status: PipelineStatus) -> bool {
    match status {
        PipelineStatus::RetrievalError | PipelineStatus::GenerationError => true,
        PipelineStatus::Success
        | PipelineStatus::NoRelevantContext
        | PipelineStatus::RejectedInput
        | PipelineStatus::InvalidOutput => false,
    }
}

pub fn exit_code_for(status: PipelineStatus) -> ExitCode {
    if is_unrecoverable(status) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_query() {
        let cli = Cli::try_parse_from([
            "rag-guardrails",
            "What cache is used?",
            "--threshold-mode",
            "strict",
            "--template-mode",
            "balanced",
        ])
        .unwrap();

        assert_eq!(cli.query.as_deref(), Some("What cache is used?"));
        assert_eq!(cli.threshold_mode, Some(ThresholdMode::Strict));
        assert_eq!(cli.template_mode, Some(TemplateMode::Balanced));
        assert!(!cli.test);
    }

    #[test]
    fn test_query_required_without_test_flag() {
        assert!(Cli::try_parse_from(["rag-guardrails"]).is_err());
        assert!(Cli::try_parse_from(["rag-guardrails", "--test"]).is_ok());
    }

    #[test]
    fn test_test_flag_conflicts_with_query() {
        assert!(Cli::try_parse_from(["rag-guardrails", "q?", "--test"]).is_err());
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(
            Cli::try_parse_from(["rag-guardrails", "q?", "--threshold-mode", "loose"]).is_err()
        );
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = Cli::try_parse_from([
            "rag-guardrails",
            "q?",
            "--threshold-mode",
            "permissive",
            "--threshold",
            "0.42",
        ])
        .unwrap();
        let mut config = AppConfig::default();

        cli.apply_overrides(&mut config);

        assert_eq!(config.guardrail.threshold_mode, ThresholdMode::Permissive);
        assert_eq!(config.guardrail.threshold(), 0.42);
        assert_eq!(config.guardrail.template_mode, TemplateMode::Strict);
    }

    #[test]
    fn test_build_pipeline_from_defaults() {
        let pipeline = build_pipeline(&AppConfig::default()).unwrap();
        assert_eq!(pipeline.config().threshold(), 0.35);
    }

    #[test]
    fn test_only_service_failures_are_unrecoverable() {
        let failing: Vec<PipelineStatus> = PipelineStatus::ALL
            .into_iter()
            .filter(|s| is_unrecoverable(*s))
            .collect();

        assert_eq!(
            failing,
            vec![PipelineStatus::RetrievalError, PipelineStatus::GenerationError]
        );
    }
}
