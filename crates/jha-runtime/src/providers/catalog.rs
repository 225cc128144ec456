//! Capability and price profiles for known model families.
//!
//! HTTP adapters look their profile up by model id at construction time.
//! Configuration may override either half.

use super::{Capability, CapabilitySet, TokenCost};

/// What a model advertises to the router.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProfile {
    pub capabilities: CapabilitySet,
    pub cost: TokenCost,
}

impl ModelProfile {
    fn new(capabilities: &[Capability], cost: TokenCost) -> Self {
        Self {
            capabilities: capabilities.iter().copied().collect(),
            cost,
        }
    }
}

use Capability::{Creative, DeepReasoning, FastReasoning, LongContext, StructuredOutput};

pub const ANTHROPIC_DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const OPENROUTER_DEFAULT_MODEL: &str = "google/gemini-2.0-flash-exp:free";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Claude models: Opus reasons deeply, everything else is fast.
pub fn anthropic(model: &str) -> ModelProfile {
    if model.contains("opus") {
        ModelProfile::new(
            &[DeepReasoning, LongContext, StructuredOutput, Creative],
            TokenCost::new(0.015, 0.075),
        )
    } else {
        ModelProfile::new(
            &[FastReasoning, StructuredOutput, LongContext],
            TokenCost::new(0.003, 0.015),
        )
    }
}

/// Models reached through OpenRouter, keyed by the routed model id.
pub fn openrouter(model: &str) -> ModelProfile {
    if model.contains("gemini-2.0-flash") {
        let cost = if model.contains(":free") {
            TokenCost::FREE
        } else {
            TokenCost::new(0.00015, 0.0006)
        };
        ModelProfile::new(&[FastReasoning, StructuredOutput, LongContext], cost)
    } else if model.contains("claude-3.5-sonnet") {
        ModelProfile::new(
            &[FastReasoning, DeepReasoning, StructuredOutput, Creative, LongContext],
            TokenCost::new(0.003, 0.015),
        )
    } else if model.contains("gpt-4o") {
        ModelProfile::new(
            &[FastReasoning, DeepReasoning, StructuredOutput, Creative],
            TokenCost::new(0.005, 0.015),
        )
    } else {
        ModelProfile::new(&[FastReasoning, StructuredOutput], TokenCost::new(0.001, 0.003))
    }
}

/// Gemini models called directly.
pub fn gemini(_model: &str) -> ModelProfile {
    ModelProfile::new(
        &[FastReasoning, StructuredOutput, LongContext],
        TokenCost::new(0.00015, 0.0006),
    )
}
