//! Quantitative risk assessment over the validated checklist.

use jha_core::Stage;

use super::llm::LlmStageAgent;
use super::traits::{StageError, StagePrompt};
use crate::context::PipelineContext;
use crate::prompts;
use crate::providers::{Capability, CapabilitySet};

#[derive(Debug, Clone, Copy, Default)]
pub struct RiskAssessorProfile;

pub type RiskAssessorAgent = LlmStageAgent<RiskAssessorProfile>;

impl StagePrompt for RiskAssessorProfile {
    fn stage(&self) -> Stage {
        Stage::RiskAssessment
    }

    fn capabilities(&self) -> CapabilitySet {
        [Capability::FastReasoning, Capability::StructuredOutput]
            .into_iter()
            .collect()
    }

    fn temperature(&self) -> f32 {
        0.7
    }

    fn max_tokens(&self) -> u32 {
        4000
    }

    fn build_prompt(&self, ctx: &PipelineContext) -> Result<String, StageError> {
        let validation = ctx
            .output(Stage::Validation)
            .ok_or(StageError::MissingUpstream(Stage::Validation))?;

        Ok(prompts::risk_prompt(
            validation,
            ctx.checklist(),
            ctx.weather(),
            ctx.reference(),
        ))
    }
}
