//! Checklist validation: data quality score and missing critical fields.

use jha_core::Stage;

use super::llm::LlmStageAgent;
use super::traits::{StageError, StagePrompt};
use crate::context::PipelineContext;
use crate::prompts;
use crate::providers::{Capability, CapabilitySet};

/// Runs cold and tightly bounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatorProfile;

pub type ValidatorAgent = LlmStageAgent<ValidatorProfile>;

impl StagePrompt for ValidatorProfile {
    fn stage(&self) -> Stage {
        Stage::Validation
    }

    fn capabilities(&self) -> CapabilitySet {
        [Capability::FastReasoning, Capability::StructuredOutput]
            .into_iter()
            .collect()
    }

    fn temperature(&self) -> f32 {
        0.3
    }

    fn max_tokens(&self) -> u32 {
        3000
    }

    fn build_prompt(&self, ctx: &PipelineContext) -> Result<String, StageError> {
        Ok(prompts::validation_prompt(
            ctx.checklist(),
            ctx.weather(),
            ctx.reference(),
        ))
    }
}
