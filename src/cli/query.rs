//! Single-question mode

use std::fmt::Write as _;
use std::process::ExitCode;

use crate::config::AppConfig;
use crate::domain::guardrail::PipelineResult;

use super::{build_pipeline, exit_code_for};

pub async fn run(
    config: &AppConfig,
    question: &str,
    json: bool,
    detailed: bool,
) -> anyhow::Result<ExitCode> {
    let pipeline = build_pipeline(config)?;
    let result = pipeline.execute(question).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render(config, question, &result, detailed));
    }

    Ok(exit_code_for(result.status))
}

/// Human-readable report of one run
pub fn render(config: &AppConfig, question: &str, result: &PipelineResult, detailed: bool) -> String {
    let guardrail = &config.guardrail;
    let mut out = String::new();

    let _ = writeln!(out, "Query: {}", question);
    let _ = writeln!(out, "Threshold mode: {}", guardrail.threshold_mode);
    let _ = writeln!(out, "Template mode: {}", guardrail.template_mode);
    if let Some(custom) = guardrail.custom_threshold {
        let _ = writeln!(out, "Custom threshold: {}", custom);
    }
    let _ = writeln!(out, "{}", "-".repeat(60));

    let _ = writeln!(out, "\nSTATUS: {}", result.status);
    let _ = writeln!(out, "RESPONSE:\n{}", result.response);

    if let Some(ref summary) = result.summary {
        let _ = writeln!(out, "\nSUMMARY:");
        let _ = writeln!(out, "  Chunks used: {}", summary.chunks_used);
        let _ = writeln!(out, "  Threshold: {:.2}", summary.threshold);
        let _ = writeln!(out, "  Template mode: {}", summary.template_mode);
        let _ = writeln!(out, "  Fidelity score: {}", fmt_score(summary.fidelity_score));
        let _ = writeln!(out, "  Source citation: {}", fmt_flag(summary.source_citation));
        if summary.fidelity_warning {
            let _ = writeln!(out, "  Warning: low fidelity to the retrieved context");
        }
    }

    let sources = result.unique_sources();
    if !sources.is_empty() {
        let _ = writeln!(out, "\nSOURCES:");
        for source in sources {
            let _ = writeln!(out, "  - {}", source);
        }
    }

    if detailed {
        render_details(&mut out, result);
    }

    out
}

fn render_details(out: &mut String, result: &PipelineResult) {
    let _ = writeln!(out, "\nDETAILS (request {}):", result.request_id);

    if let Some(ref input) = result.telemetry.input {
        let _ = writeln!(
            out,
            "  Input: sanitized={:?} truncated={}",
            input.sanitized(),
            input.was_truncated()
        );
    }

    if let Some(ref retrieval) = result.telemetry.retrieval {
        let _ = writeln!(
            out,
            "  Retrieval: {} retrieved, {} accepted ({:.1}%), rejection rate {:.2}",
            retrieval.total_retrieved,
            retrieval.total_accepted,
            retrieval.acceptance_percentage(),
            retrieval.rejection_rate
        );
        if let Some(stats) = retrieval.score_stats {
            let _ = writeln!(
                out,
                "  Distances: min {:.3}, max {:.3}, mean {:.3}",
                stats.min, stats.max, stats.mean
            );
        }
        for decision in &retrieval.decisions {
            let verdict = match decision.rejection {
                Some(cause) => cause.as_str(),
                None => "accepted",
            };
            let _ = writeln!(
                out,
                "    {:.3}  {:<16} {}",
                decision.distance, verdict, decision.source
            );
        }
    }

    if let Some(ref generation) = result.telemetry.generation {
        let _ = writeln!(
            out,
            "  Generation: model {}, temperature {}, context {} chars, prompt {} chars",
            generation.model,
            generation.temperature,
            generation.context_length,
            generation.prompt_length
        );
    }

    if let Some(ref output) = result.telemetry.output {
        let _ = writeln!(
            out,
            "  Output: marker {:?}, {} chars, scorer {}",
            output.marker, output.original_length, output.scorer
        );
    }

    if let Some(ref error) = result.telemetry.error {
        let _ = writeln!(out, "  Error: {}", error);
    }
}

pub(crate) fn fmt_score(score: Option<f32>) -> String {
    score
        .map(|s| format!("{:.2}", s))
        .unwrap_or_else(|| "N/A".to_string())
}

fn fmt_flag(flag: Option<bool>) -> &'static str {
    match flag {
        Some(true) => "yes",
        Some(false) => "no",
        None => "N/A",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::guardrail::{
        PipelineStatus, ResultSummary, TelemetryBundle, TemplateMode, NO_RELEVANT_CONTEXT_MESSAGE,
    };
    use uuid::Uuid;

    fn success() -> PipelineResult {
        PipelineResult::success(
            Uuid::new_v4(),
            "Based on the provided context: Redis. (Source: cache.md)",
            vec!["cache.md".into(), "ops.md".into(), "cache.md".into()],
            TelemetryBundle::default(),
            ResultSummary {
                chunks_used: 3,
                threshold: 0.35,
                template_mode: TemplateMode::Strict,
                fidelity_score: Some(0.8125),
                source_citation: Some(true),
                fidelity_warning: false,
                no_context_found: false,
            },
        )
    }

    #[test]
    fn test_render_success() {
        let text = render(&AppConfig::default(), "What cache?", &success(), false);

        assert!(text.contains("STATUS: success"));
        assert!(text.contains("Chunks used: 3"));
        assert!(text.contains("Fidelity score: 0.81"));
        assert!(text.contains("Source citation: yes"));
        assert_eq!(text.matches("  - cache.md").count(), 1);
        assert!(text.contains("  - ops.md"));
        assert!(!text.contains("DETAILS"));
    }

    #[test]
    fn test_render_failure_has_no_summary() {
        let result = PipelineResult::failure(
            Uuid::new_v4(),
            PipelineStatus::NoRelevantContext,
            NO_RELEVANT_CONTEXT_MESSAGE,
            TelemetryBundle::default(),
        );

        let text = render(&AppConfig::default(), "Unicorns?", &result, true);

        assert!(text.contains("STATUS: no_relevant_context"));
        assert!(text.contains(NO_RELEVANT_CONTEXT_MESSAGE));
        assert!(!text.contains("SUMMARY"));
        assert!(!text.contains("SOURCES"));
        assert!(text.contains("DETAILS"));
    }

    #[test]
    fn test_fmt_score() {
        assert_eq!(fmt_score(None), "N/A");
        assert_eq!(fmt_score(Some(0.5)), "0.50");
    }
}
