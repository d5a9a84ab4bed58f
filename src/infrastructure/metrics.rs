//! Prometheus metrics for guardrail runs

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::guardrail::{GuardrailTelemetry, PipelineStage, PipelineStatus};

/// Handle used to render the recorded metrics
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    /// Metrics in Prometheus text exposition format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Install the global Prometheus recorder. Without it, every flush is a no-op.
pub fn init_metrics() -> Option<PrometheusMetrics> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("guardrail_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            tracing::debug!("Prometheus recorder installed");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChunkCounts {
    retrieved: usize,
    accepted: usize,
    above_threshold: usize,
    too_short: usize,
    degenerate: usize,
}

/// Measurements of one pipeline run, held back until the run reaches a
/// terminal status. Dropping it records nothing.
#[derive(Debug, Default)]
pub struct RunMetrics {
    stages: Vec<(PipelineStage, Duration)>,
    chunks: Option<ChunkCounts>,
    fidelity: Option<f32>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time spent reaching `stage`
    pub fn stage(&mut self, stage: PipelineStage, duration: Duration) {
        self.stages.push((stage, duration));
    }

    /// Chunk counts from one retrieval guardrail pass
    pub fn retrieval(&mut self, telemetry: &GuardrailTelemetry) {
        self.chunks = Some(ChunkCounts {
            retrieved: telemetry.total_retrieved,
            accepted: telemetry.total_accepted,
            above_threshold: telemetry.rejected_above_threshold,
            too_short: telemetry.rejected_too_short,
            degenerate: telemetry.rejected_degenerate,
        });
    }

    pub fn fidelity(&mut self, score: f32) {
        self.fidelity = Some(score);
    }

    /// Record everything collected for a run that ended with `status`
    pub fn flush(self, status: PipelineStatus, duration: Duration) {
        counter!("guardrail_pipeline_runs_total", "status" => status.as_str()).increment(1);
        histogram!("guardrail_pipeline_duration_seconds", "status" => status.as_str())
            .record(duration.as_secs_f64());

        for (stage, elapsed) in self.stages {
            histogram!("guardrail_stage_duration_seconds", "stage" => stage.as_str())
                .record(elapsed.as_secs_f64());
        }

        if let Some(chunks) = self.chunks {
            counter!("guardrail_chunks_retrieved_total").increment(chunks.retrieved as u64);
            counter!("guardrail_chunks_accepted_total").increment(chunks.accepted as u64);

            let rejected = [
                ("above_threshold", chunks.above_threshold),
                ("too_short", chunks.too_short),
                ("degenerate", chunks.degenerate),
            ];
            for (cause, count) in rejected {
                if count > 0 {
                    counter!("guardrail_chunks_rejected_total", "cause" => cause)
                        .increment(count as u64);
                }
            }
        }

        if let Some(score) = self.fidelity {
            histogram!("guardrail_fidelity_score").record(f64::from(score));
        }
    }
}
