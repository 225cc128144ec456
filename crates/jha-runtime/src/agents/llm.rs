//! The shared execution path of every model-backed stage.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jha_core::{extract_json_object, validate_stage_output, Stage};

use super::traits::{StageAgent, StageError, StagePrompt};
use crate::config::{StageOverride, StageOverrideStore, DEFAULT_STAGE_TIMEOUT};
use crate::context::PipelineContext;
use crate::providers::{GenerateParams, ModelAdapter, ResponseFormat};
use crate::router::CapabilityRouter;
use crate::task::{StageResponse, StageTask};

const RAW_PREVIEW_CHARS: usize = 500;

/// A model-backed stage: prompt, route, generate under a timeout, extract,
/// validate.
pub struct LlmStageAgent<P> {
    profile: P,
    router: Arc<CapabilityRouter>,
    timeout: Duration,
    overrides: Option<Arc<dyn StageOverrideStore>>,
}

impl<P: StagePrompt> LlmStageAgent<P> {
    pub fn new(profile: P, router: Arc<CapabilityRouter>) -> Self {
        Self {
            profile,
            router,
            timeout: DEFAULT_STAGE_TIMEOUT,
            overrides: None,
        }
    }

    /// Timeout applied when no override sets one.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_overrides(mut self, overrides: Arc<dyn StageOverrideStore>) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn profile(&self) -> &P {
        &self.profile
    }

    fn stage_override(&self) -> StageOverride {
        self.overrides
            .as_ref()
            .and_then(|store| store.stage_override(self.profile.stage()))
            .unwrap_or_default()
    }

    /// The task this stage sends for `ctx`, and the timeout it runs under.
    pub fn task(&self, ctx: &PipelineContext) -> (StageTask, Duration) {
        let stage_override = self.stage_override();

        let mut task = StageTask::new(self.profile.stage(), self.profile.capabilities());
        task.input_data = serde_json::to_value(ctx.outputs()).unwrap_or(Value::Null);
        task.temperature = stage_override
            .temperature
            .unwrap_or_else(|| self.profile.temperature());
        task.max_tokens = Some(
            stage_override
                .max_tokens
                .unwrap_or_else(|| self.profile.max_tokens()),
        );
        task.preferred_provider = stage_override.provider;
        task.preferred_model = stage_override.model;

        (task, stage_override.timeout.unwrap_or(self.timeout))
    }

    fn fail(&self, error: StageError, started: Instant) -> StageResponse {
        let stage = self.profile.stage();
        tracing::warn!(stage = %stage, error = %error, "stage failed");
        StageResponse::failed(stage, error.kind(), error.to_string())
            .with_execution_time(started.elapsed().as_millis() as u64)
    }

    fn parse(stage: Stage, text: &str) -> Result<Value, StageError> {
        let value = extract_json_object(text)?;
        validate_stage_output(stage, &value)?;
        Ok(value)
    }
}

fn preview(text: &str) -> String {
    text.chars().take(RAW_PREVIEW_CHARS).collect()
}

#[async_trait]
impl<P: StagePrompt> StageAgent for LlmStageAgent<P> {
    fn stage(&self) -> Stage {
        self.profile.stage()
    }

    async fn execute(&self, ctx: &PipelineContext) -> StageResponse {
        let started = Instant::now();
        let stage = self.profile.stage();

        let prompt = match self.profile.build_prompt(ctx) {
            Ok(prompt) => prompt,
            Err(e) => return self.fail(e, started),
        };
        let (task, timeout) = self.task(ctx);
        let adapter: Arc<dyn ModelAdapter> = match self.router.route(&task) {
            Ok(adapter) => adapter,
            Err(e) => return self.fail(e.into(), started),
        };

        let params = GenerateParams {
            temperature: task.temperature,
            max_tokens: task.max_tokens,
            response_format: ResponseFormat::Json,
        };
        tracing::debug!(
            stage = %stage,
            adapter = %adapter.label(),
            temperature = task.temperature,
            timeout = ?timeout,
            "calling model"
        );

        let generation =
            match tokio::time::timeout(timeout, adapter.generate(&prompt, &params)).await {
                Ok(Ok(generation)) => generation,
                Ok(Err(e)) => {
                    return self
                        .fail(e.into(), started)
                        .with_model(Some(adapter.provider()), adapter.model())
                }
                Err(_) => {
                    return self
                        .fail(StageError::Timeout(timeout), started)
                        .with_model(Some(adapter.provider()), adapter.model())
                }
            };

        tracing::debug!(stage = %stage, preview = %preview(&generation.text), "raw model response");
        let cost = adapter.cost_per_1k_tokens().estimate(&generation.token_usage);

        let response = match Self::parse(stage, &generation.text) {
            Ok(output) => StageResponse::succeeded(stage, output),
            Err(e) => self.fail(e, started),
        };

        response
            .with_model(Some(adapter.provider()), generation.model)
            .with_usage(generation.token_usage, cost)
            .with_execution_time(started.elapsed().as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{StageErrorKind, ValidatorProfile};
    use crate::context::PipelineInputs;
    use crate::providers::{Provider, ProviderError, ScriptedAdapter, ScriptedReply, TokenCost};
    use chrono::Utc;
    use jha_core::{Checklist, ReferenceData, WeatherConditions};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn ctx() -> PipelineContext {
        PipelineContext::new(PipelineInputs {
            checklist: Checklist::default(),
            weather: WeatherConditions::default(),
            reference: ReferenceData::default(),
            current_time: Utc::now(),
        })
    }

    fn agent(adapter: ScriptedAdapter) -> (LlmStageAgent<ValidatorProfile>, Arc<ScriptedAdapter>) {
        let adapter = Arc::new(adapter);
        let router = CapabilityRouter::new(vec![adapter.clone() as Arc<dyn ModelAdapter>]).unwrap();
        (LlmStageAgent::new(ValidatorProfile, Arc::new(router)), adapter)
    }

    #[tokio::test]
    async fn test_fenced_reply_succeeds() {
        let (agent, adapter) = agent(
            ScriptedAdapter::new(Provider::Local, "fixture")
                .with_cost(TokenCost::new(0.001, 0.002))
                .default_reply(ScriptedReply::json(&json!({"validation": {"qualityScore": 8}}))),
        );

        let response = agent.execute(&ctx()).await;
        assert!(response.success, "{:?}", response.error);
        assert_eq!(response.output_data["validation"]["qualityScore"], 8);
        assert_eq!(response.model_used.as_deref(), Some("fixture"));
        assert_eq!(response.provider, Some(Provider::Local));
        assert!(response.token_usage.total_tokens > 0);
        assert!(response.estimated_cost > 0.0);

        let call = &adapter.calls()[0];
        assert_eq!(call.temperature, 0.3);
        assert_eq!(call.max_tokens, Some(3000));
    }

    #[tokio::test]
    async fn test_prose_reply_is_parse_failure() {
        let (agent, _) = agent(
            ScriptedAdapter::new(Provider::Local, "fixture")
                .default_reply(ScriptedReply::text("I could not review this checklist.")),
        );

        let response = agent.execute(&ctx()).await;
        assert!(!response.success);
        assert!(response.output_data.is_null());
        assert_eq!(response.error_kind, Some(StageErrorKind::Parse));
        assert_eq!(response.model_used.as_deref(), Some("fixture"));
    }

    #[tokio::test]
    async fn test_schema_violation_is_validation_failure() {
        let (agent, _) = agent(
            ScriptedAdapter::new(Provider::Local, "fixture")
                .default_reply(ScriptedReply::json(&json!({"validation": {"qualityScore": "high"}}))),
        );

        let response = agent.execute(&ctx()).await;
        assert!(!response.success);
        assert_eq!(response.error_kind, Some(StageErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_provider_error_is_captured() {
        let (agent, _) = agent(
            ScriptedAdapter::new(Provider::Local, "fixture")
                .default_reply(ScriptedReply::error(ProviderError::AuthError)),
        );

        let response = agent.execute(&ctx()).await;
        assert!(!response.success);
        assert_eq!(response.error_kind, Some(StageErrorKind::Provider));
        assert!(response.error.unwrap().contains("Authentication failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_model_times_out() {
        let (agent, _) = agent(
            ScriptedAdapter::new(Provider::Local, "slow").default_reply(
                ScriptedReply::json(&json!({"validation": {"qualityScore": 8}}))
                    .delayed(Duration::from_secs(120)),
            ),
        );
        let agent = agent.with_timeout(Duration::from_secs(5));

        let response = agent.execute(&ctx()).await;
        assert!(!response.success);
        assert_eq!(response.error_kind, Some(StageErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_overrides_shape_the_task() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            Stage::Validation,
            StageOverride {
                temperature: Some(0.1),
                max_tokens: Some(1200),
                provider: Some(Provider::Anthropic),
                timeout: Some(Duration::from_secs(10)),
                ..Default::default()
            },
        );
        let (agent, _) = agent(ScriptedAdapter::new(Provider::Local, "fixture"));
        let agent = agent.with_overrides(Arc::new(overrides));

        let (task, timeout) = agent.task(&ctx());
        assert_eq!(task.temperature, 0.1);
        assert_eq!(task.max_tokens, Some(1200));
        assert_eq!(task.preferred_provider, Some(Provider::Anthropic));
        assert_eq!(timeout, Duration::from_secs(10));
    }
}
