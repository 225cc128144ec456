//! Synthesis stage: the deterministic report, no model call.

use async_trait::async_trait;
use std::time::Instant;

use jha_core::{FinalReport, Stage, SynthesisInput, Synthesizer};

use super::traits::{StageAgent, StageError};
use crate::context::PipelineContext;
use crate::task::StageResponse;

/// Recorded as `model_used` on synthesis responses.
pub const SYNTHESIS_MODEL: &str = "structured-synthesis";

#[derive(Debug, Clone, Copy, Default)]
pub struct SynthesisAgent {
    synthesizer: Synthesizer,
}

impl SynthesisAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the report from the three upstream outputs.
    pub fn synthesize(&self, ctx: &PipelineContext) -> Result<FinalReport, StageError> {
        let upstream = |stage| ctx.output(stage).ok_or(StageError::MissingUpstream(stage));

        let input = SynthesisInput {
            validation: upstream(Stage::Validation)?,
            risk: upstream(Stage::RiskAssessment)?,
            prediction: upstream(Stage::IncidentPrediction)?,
            checklist: ctx.checklist(),
            weather: ctx.weather(),
        };
        Ok(self.synthesizer.synthesize(&input, ctx.current_time()))
    }

    /// Response recorded for a synthesized report.
    pub fn response(report: &FinalReport, started: Instant) -> StageResponse {
        let output = serde_json::to_value(report).unwrap_or_default();
        StageResponse::succeeded(Stage::Synthesis, output)
            .with_model(None, SYNTHESIS_MODEL)
            .with_execution_time(started.elapsed().as_millis() as u64)
    }
}

#[async_trait]
impl StageAgent for SynthesisAgent {
    fn stage(&self) -> Stage {
        Stage::Synthesis
    }

    async fn execute(&self, ctx: &PipelineContext) -> StageResponse {
        let started = Instant::now();
        match self.synthesize(ctx) {
            Ok(report) => Self::response(&report, started),
            Err(e) => {
                tracing::warn!(stage = %Stage::Synthesis, error = %e, "stage failed");
                StageResponse::failed(Stage::Synthesis, e.kind(), e.to_string())
            }
        }
    }
}
