//! The unit of work sent to a model, and what comes back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use jha_core::Stage;

use crate::agents::StageErrorKind;
use crate::providers::{CapabilitySet, Provider, TokenUsage};

/// One stage's request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTask {
    pub task_type: Stage,
    pub input_data: Value,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub required_capabilities: CapabilitySet,
    pub preferred_provider: Option<Provider>,
    /// Model id pin from a per-stage override.
    pub preferred_model: Option<String>,
}

impl StageTask {
    pub fn new(task_type: Stage, required_capabilities: CapabilitySet) -> Self {
        Self {
            task_type,
            input_data: Value::Null,
            temperature: 0.7,
            max_tokens: None,
            required_capabilities,
            preferred_provider: None,
            preferred_model: None,
        }
    }
}

/// One stage's outcome.
///
/// `success == false` implies `output_data` is JSON `null` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResponse {
    pub stage: Stage,
    pub success: bool,
    pub output_data: Value,
    pub model_used: Option<String>,
    pub provider: Option<Provider>,
    pub execution_time_ms: u64,
    pub token_usage: TokenUsage,
    /// Estimated USD cost of the call, from the adapter's price.
    pub estimated_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<StageErrorKind>,
}

impl StageResponse {
    pub fn succeeded(stage: Stage, output_data: Value) -> Self {
        Self {
            stage,
            success: true,
            output_data,
            model_used: None,
            provider: None,
            execution_time_ms: 0,
            token_usage: TokenUsage::default(),
            estimated_cost: 0.0,
            error: None,
            error_kind: None,
        }
    }

    pub fn failed(stage: Stage, kind: StageErrorKind, error: impl Into<String>) -> Self {
        Self {
            stage,
            success: false,
            output_data: Value::Null,
            model_used: None,
            provider: None,
            execution_time_ms: 0,
            token_usage: TokenUsage::default(),
            estimated_cost: 0.0,
            error: Some(error.into()),
            error_kind: Some(kind),
        }
    }

    pub fn with_model(mut self, provider: Option<Provider>, model: impl Into<String>) -> Self {
        self.provider = provider;
        self.model_used = Some(model.into());
        self
    }

    pub fn with_usage(mut self, token_usage: TokenUsage, estimated_cost: f64) -> Self {
        self.token_usage = token_usage;
        self.estimated_cost = estimated_cost;
        self
    }

    pub fn with_execution_time(mut self, execution_time_ms: u64) -> Self {
        self.execution_time_ms = execution_time_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_response_has_null_output() {
        let response = StageResponse::failed(Stage::Validation, StageErrorKind::Timeout, "timed out");
        assert!(!response.success);
        assert!(response.output_data.is_null());
        assert_eq!(response.error.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let response = StageResponse::succeeded(Stage::RiskAssessment, json!({"hazards": []}))
            .with_model(Some(Provider::Local), "fixture")
            .with_execution_time(12);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["stage"], "risk_assessment");
        assert_eq!(value["modelUsed"], "fixture");
        assert_eq!(value["executionTimeMs"], 12);
        assert!(value.get("error").is_none());
    }
}
