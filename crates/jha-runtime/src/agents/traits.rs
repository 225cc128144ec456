//! Stage agent trait and common types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use jha_core::{ExtractError, SchemaError, Stage};

use crate::context::PipelineContext;
use crate::providers::{CapabilitySet, ProviderError};
use crate::router::RoutingError;
use crate::task::StageResponse;

/// Errors from stage agents. Agents report them inside a failed
/// [`StageResponse`] rather than returning them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("Routing failed: {0}")]
    Routing(#[from] RoutingError),

    #[error("Model call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Unparseable model response: {0}")]
    Parse(#[from] ExtractError),

    #[error("{0}")]
    Validation(#[from] SchemaError),

    #[error("pipeline run cancelled")]
    Cancelled,

    #[error("{0} output missing from pipeline context")]
    MissingUpstream(Stage),
}

impl StageError {
    pub fn kind(&self) -> StageErrorKind {
        match self {
            StageError::Routing(_) => StageErrorKind::Routing,
            StageError::Provider(_) => StageErrorKind::Provider,
            StageError::Timeout(_) => StageErrorKind::Timeout,
            StageError::Parse(_) => StageErrorKind::Parse,
            StageError::Validation(_) => StageErrorKind::Validation,
            StageError::Cancelled => StageErrorKind::Cancelled,
            StageError::MissingUpstream(_) => StageErrorKind::MissingUpstream,
        }
    }
}

/// Failure class recorded on a failed response, for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    Routing,
    Provider,
    Timeout,
    Parse,
    Validation,
    Cancelled,
    MissingUpstream,
}

/// One step of the pipeline.
///
/// # Isolation Contract
/// - reads only the run inputs and the outputs of earlier stages
/// - holds no per-run state, so one agent serves concurrent runs
/// - never panics or returns early with an error: every failure becomes
///   `StageResponse { success: false, .. }`
#[async_trait]
pub trait StageAgent: Send + Sync {
    fn stage(&self) -> Stage;

    async fn execute(&self, ctx: &PipelineContext) -> StageResponse;
}

/// What makes a model-backed stage distinct: its capabilities, sampling
/// defaults and prompt. [`LlmStageAgent`](super::LlmStageAgent) does the rest.
pub trait StagePrompt: Send + Sync {
    fn stage(&self) -> Stage;

    fn capabilities(&self) -> CapabilitySet;

    fn temperature(&self) -> f32;

    fn max_tokens(&self) -> u32;

    /// Build the prompt. Fails only when a required upstream output is absent.
    fn build_prompt(&self, ctx: &PipelineContext) -> Result<String, StageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            StageError::Timeout(Duration::from_secs(1)).kind(),
            StageErrorKind::Timeout
        );
        assert_eq!(
            StageError::from(ExtractError::NotFound).kind(),
            StageErrorKind::Parse
        );
        assert_eq!(
            StageError::MissingUpstream(Stage::Validation).to_string(),
            "validation output missing from pipeline context"
        );
        assert_eq!(
            serde_json::to_value(StageErrorKind::MissingUpstream).unwrap(),
            "missing_upstream"
        );
    }
}
