//! Guardrail pipeline orchestration
//!
//! Sequences input validation, retrieval, chunk filtering, context assembly,
//! prompt rendering, generation and output validation. The first terminal
//! condition ends the run; later stages never execute.

use std::convert::Infallible;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::domain::guardrail::{
    ContextAssembler, GenerationMetadata, GuardrailConfig, InputValidator, OutputValidator,
    PipelineResult, PipelineStage, PipelineStatus, PromptBuilder, ResultSummary,
    RetrievalGuardrail, TelemetryBundle, ValidationMarker, NO_RELEVANT_CONTEXT_MESSAGE,
};
use crate::domain::{DomainError, Generator, Retriever};
use crate::infrastructure::metrics::RunMetrics;

/// End-to-end question answering with guardrails at every stage
#[derive(Debug, Clone)]
pub struct GuardrailPipeline {
    config: GuardrailConfig,
    input_validator: InputValidator,
    retriever: Retriever,
    guardrail: RetrievalGuardrail,
    assembler: ContextAssembler,
    prompt_builder: PromptBuilder,
    generator: Generator,
    output_validator: OutputValidator,
}

impl GuardrailPipeline {
    /// Build a pipeline; fails when the guardrail configuration is invalid
    pub fn new(
        config: GuardrailConfig,
        retriever: Retriever,
        generator: Generator,
    ) -> Result<Self, DomainError> {
        config.validate()?;

        Ok(Self {
            input_validator: InputValidator::new(&config),
            guardrail: RetrievalGuardrail::new(&config),
            assembler: ContextAssembler::new(),
            prompt_builder: PromptBuilder::new(),
            output_validator: OutputValidator::new(&config),
            config,
            retriever,
            generator,
        })
    }

    /// Replace the output validator (e.g. to plug in another fidelity scorer)
    pub fn with_output_validator(mut self, validator: OutputValidator) -> Self {
        self.output_validator = validator;
        self
    }

    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    /// Run one query to its terminal status
    pub async fn execute(&self, raw_query: &str) -> PipelineResult {
        match self.run(raw_query, |_| Ok::<(), Infallible>(())).await {
            Ok(result) => result,
            Err(never) => match never {},
        }
    }

    /// Like [`execute`](Self::execute), but checks `token` at every stage
    /// boundary. A cancelled run returns [`DomainError::Cancelled`] and its
    /// partial telemetry is discarded.
    pub async fn execute_with_cancellation(
        &self,
        raw_query: &str,
        token: &CancellationToken,
    ) -> Result<PipelineResult, DomainError> {
        self.run(raw_query, |stage| {
            if token.is_cancelled() {
                info!(stage = %stage, "Pipeline cancelled");
                Err(DomainError::cancelled(stage.as_str()))
            } else {
                Ok(())
            }
        })
        .await
    }

    async fn run<E, G>(&self, raw_query: &str, checkpoint: G) -> Result<PipelineResult, E>
    where
        G: Fn(PipelineStage) -> Result<(), E>,
    {
        let request_id = Uuid::new_v4();
        let span = info_span!("guardrail_pipeline", request_id = %request_id);

        self.run_stages(request_id, raw_query, checkpoint)
            .instrument(span)
            .await
    }

    async fn run_stages<E, G>(
        &self,
        request_id: Uuid,
        raw_query: &str,
        checkpoint: G,
    ) -> Result<PipelineResult, E>
    where
        G: Fn(PipelineStage) -> Result<(), E>,
    {
        let started = Instant::now();
        let mut telemetry = TelemetryBundle::default();
        let mut run_metrics = RunMetrics::new();

        // Input validation
        checkpoint(PipelineStage::Start)?;
        let stage_start = Instant::now();
        let query = self.input_validator.validate(raw_query);
        run_metrics.stage(PipelineStage::InputValidated, stage_start.elapsed());
        telemetry.input = Some(query.clone());

        if let Some(reason) = query.rejection() {
            let message = format!("Invalid query: {}", reason);
            let result = PipelineResult::failure(
                request_id,
                PipelineStatus::RejectedInput,
                message,
                telemetry,
            );
            return Ok(finish(result, started, run_metrics));
        }

        // Retrieval and chunk filtering
        checkpoint(PipelineStage::InputValidated)?;
        let stage_start = Instant::now();
        let chunks = match self
            .retriever
            .retrieve(query.sanitized(), self.config.max_chunks_retrieved)
            .await
        {
            Ok(chunks) => chunks,
            Err(e) => {
                telemetry.error = Some(e.to_string());
                let result = PipelineResult::failure(
                    request_id,
                    PipelineStatus::RetrievalError,
                    format!("Retrieval failed: {}", e.detail()),
                    telemetry,
                );
                return Ok(finish(result, started, run_metrics));
            }
        };

        let outcome = self.guardrail.evaluate(chunks);
        run_metrics.stage(PipelineStage::Retrieved, stage_start.elapsed());
        run_metrics.retrieval(&outcome.telemetry);
        telemetry.retrieval = Some(outcome.telemetry.clone());

        if !outcome.is_sufficient() {
            let result = PipelineResult::failure(
                request_id,
                PipelineStatus::NoRelevantContext,
                NO_RELEVANT_CONTEXT_MESSAGE,
                telemetry,
            );
            return Ok(finish(result, started, run_metrics));
        }

        // Context and prompt
        checkpoint(PipelineStage::Retrieved)?;
        let stage_start = Instant::now();
        let template_mode = self.config.template_mode;
        let context = self.assembler.assemble(&outcome.accepted);
        let prompt = self
            .prompt_builder
            .build(template_mode, query.sanitized(), &context);
        run_metrics.stage(PipelineStage::ContextBuilt, stage_start.elapsed());

        telemetry.generation = Some(GenerationMetadata {
            template_mode,
            model: self.generator.model().to_string(),
            temperature: self.generator.temperature(),
            context_length: context.chars().count(),
            prompt_length: prompt.chars().count(),
        });

        // Generation
        checkpoint(PipelineStage::ContextBuilt)?;
        let stage_start = Instant::now();
        let generation = match self.generator.generate(&prompt).await {
            Ok(generation) => generation,
            Err(e) => {
                telemetry.error = Some(e.to_string());
                let result = PipelineResult::failure(
                    request_id,
                    PipelineStatus::GenerationError,
                    format!("Generation failed: {}", e.detail()),
                    telemetry,
                );
                return Ok(finish(result, started, run_metrics));
            }
        };
        run_metrics.stage(PipelineStage::Generated, stage_start.elapsed());

        // Output validation
        checkpoint(PipelineStage::Generated)?;
        let stage_start = Instant::now();
        let validation =
            self.output_validator
                .validate(&generation.answer, &context, query.sanitized());
        run_metrics.stage(PipelineStage::OutputValidated, stage_start.elapsed());

        let output = validation.metadata;
        if let Some(score) = output.fidelity_score {
            run_metrics.fidelity(score);
        }
        telemetry.output = Some(output.clone());

        if !validation.ok {
            let result = PipelineResult::failure(
                request_id,
                PipelineStatus::InvalidOutput,
                validation.final_answer,
                telemetry,
            );
            return Ok(finish(result, started, run_metrics));
        }

        let summary = ResultSummary {
            chunks_used: outcome.accepted.len(),
            threshold: outcome.telemetry.threshold,
            template_mode,
            fidelity_score: output.fidelity_score,
            source_citation: output.source_citation_present,
            fidelity_warning: output.fidelity_warning,
            no_context_found: output.marker == ValidationMarker::NoContextFound,
        };

        let result = PipelineResult::success(
            request_id,
            validation.final_answer,
            outcome.sources(),
            telemetry,
            summary,
        );
        Ok(finish(result, started, run_metrics))
    }
}

/// Log the terminal status and flush the run's metrics
fn finish(result: PipelineResult, started: Instant, run_metrics: RunMetrics) -> PipelineResult {
    let elapsed = started.elapsed();
    run_metrics.flush(result.status, elapsed);

    if result.is_success() {
        info!(
            status = %result.status,
            sources = result.sources.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Pipeline finished"
        );
    } else {
        warn!(
            status = %result.status,
            response = %result.response,
            elapsed_ms = elapsed.as_millis() as u64,
            "Pipeline terminated early"
        );
    }

    result
}
