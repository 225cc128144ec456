//! Incident prediction for the highest-scoring hazard.
//!
//! Runs hot: the stage asks the model to imagine the causal chain behind
//! the next likely incident, so it needs deep reasoning and creativity.

use jha_core::Stage;

use super::llm::LlmStageAgent;
use super::traits::{StageError, StagePrompt};
use crate::context::PipelineContext;
use crate::prompts;
use crate::providers::{Capability, CapabilitySet};

#[derive(Debug, Clone, Copy, Default)]
pub struct IncidentPredictorProfile;

pub type IncidentPredictorAgent = LlmStageAgent<IncidentPredictorProfile>;

impl StagePrompt for IncidentPredictorProfile {
    fn stage(&self) -> Stage {
        Stage::IncidentPrediction
    }

    fn capabilities(&self) -> CapabilitySet {
        [
            Capability::DeepReasoning,
            Capability::Creative,
            Capability::StructuredOutput,
        ]
        .into_iter()
        .collect()
    }

    fn temperature(&self) -> f32 {
        1.0
    }

    fn max_tokens(&self) -> u32 {
        5000
    }

    fn build_prompt(&self, ctx: &PipelineContext) -> Result<String, StageError> {
        let risk = ctx
            .output(Stage::RiskAssessment)
            .ok_or(StageError::MissingUpstream(Stage::RiskAssessment))?;

        Ok(prompts::prediction_prompt(
            risk,
            ctx.checklist(),
            ctx.weather(),
            ctx.reference(),
            ctx.current_time(),
        ))
    }
}
