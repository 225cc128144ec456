//! Pipeline orchestrator.
//!
//! Runs the four stages strictly in order:
//!
//! ```text
//! START -> VALIDATING -> ASSESSING_RISK -> PREDICTING_INCIDENT -> SYNTHESIZING -> DONE
//!              \______________\_________________\____________________\___> FAILED
//! ```
//!
//! It advances only when a stage succeeds. Any failure moves the run to
//! `FAILED`, and the caller gets the conservative STOP_WORK fallback report.
//! Runs share the router and agents and nothing else, so independent runs
//! may proceed concurrently.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use jha_core::{
    Checklist, Decision, FallbackReport, ReferenceData, Report, Stage, WeatherConditions,
};

use crate::agents::{
    IncidentPredictorProfile, LlmStageAgent, RiskAssessorProfile, StageAgent, StageError,
    StageErrorKind, StagePrompt, SynthesisAgent, ValidatorProfile,
};
use crate::config::{ConfigError, RuntimeConfig, StageOverrideStore, DEFAULT_STAGE_TIMEOUT};
use crate::context::{PipelineContext, PipelineInputs};
use crate::providers::{Provider, ProviderRegistry, TokenUsage};
use crate::router::CapabilityRouter;
use crate::task::StageResponse;
use crate::usage::RunUsage;

/// Recorded in every result's timing metadata.
pub const PIPELINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Model-backed stages, in execution order.
const MODEL_STAGES: [Stage; 3] = [
    Stage::Validation,
    Stage::RiskAssessment,
    Stage::IncidentPrediction,
];

/// Errors from building an orchestrator. Running one never errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Orchestrator not configured: {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Start,
    Validating,
    AssessingRisk,
    PredictingIncident,
    Synthesizing,
    Done,
    Failed,
}

impl PipelineState {
    /// The in-progress state while `stage` runs.
    pub fn running(stage: Stage) -> Self {
        match stage {
            Stage::Validation => PipelineState::Validating,
            Stage::RiskAssessment => PipelineState::AssessingRisk,
            Stage::IncidentPrediction => PipelineState::PredictingIncident,
            Stage::Synthesis => PipelineState::Synthesizing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Start => "START",
            PipelineState::Validating => "VALIDATING",
            PipelineState::AssessingRisk => "ASSESSING_RISK",
            PipelineState::PredictingIncident => "PREDICTING_INCIDENT",
            PipelineState::Synthesizing => "SYNTHESIZING",
            PipelineState::Done => "DONE",
            PipelineState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Inputs for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineInput {
    pub checklist: Checklist,
    pub weather: WeatherConditions,
    pub reference: ReferenceData,
    /// Clock reading the prompts and report use. `None` reads the wall clock
    /// when the run starts.
    pub current_time: Option<DateTime<Utc>>,
}

impl PipelineInput {
    pub fn new(checklist: Checklist, weather: WeatherConditions, reference: ReferenceData) -> Self {
        Self {
            checklist,
            weather,
            reference,
            current_time: None,
        }
    }

    pub fn at(mut self, current_time: DateTime<Utc>) -> Self {
        self.current_time = Some(current_time);
        self
    }
}

/// One stage attempt, kept even when the run falls back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub stage: Stage,
    pub success: bool,
    pub model: Option<String>,
    pub provider: Option<Provider>,
    pub execution_time_ms: u64,
    pub token_usage: TokenUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<StageErrorKind>,
}

impl From<&StageResponse> for StageTiming {
    fn from(response: &StageResponse) -> Self {
        Self {
            stage: response.stage,
            success: response.success,
            model: response.model_used.clone(),
            provider: response.provider,
            execution_time_ms: response.execution_time_ms,
            token_usage: response.token_usage,
            error_kind: response.error_kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingMetadata {
    pub pipeline_version: String,
    pub started_at: DateTime<Utc>,
    pub total_ms: u64,
    pub stages: Vec<StageTiming>,
    pub usage: RunUsage,
}

/// Outcome of one run.
///
/// A degraded run is signalled by `fallback` and `error`, never by the
/// decision alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// Output of every stage, or empty when the run fell back.
    pub stage_outputs: BTreeMap<Stage, Value>,
    pub final_report: Report,
    pub timing: TimingMetadata,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub state: PipelineState,
}

impl PipelineResult {
    pub fn decision(&self) -> Decision {
        self.final_report.decision()
    }
}

/// Timing and usage bookkeeping for a run in progress.
struct RunLedger {
    started_at: DateTime<Utc>,
    started: Instant,
    stages: Vec<StageTiming>,
    usage: RunUsage,
}

impl RunLedger {
    fn start() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            stages: Vec::new(),
            usage: RunUsage::default(),
        }
    }

    fn record(&mut self, response: &StageResponse) {
        self.stages.push(StageTiming::from(response));
        self.usage.add(response);
    }

    fn finish(self) -> TimingMetadata {
        TimingMetadata {
            pipeline_version: PIPELINE_VERSION.to_string(),
            started_at: self.started_at,
            total_ms: self.started.elapsed().as_millis() as u64,
            stages: self.stages,
            usage: self.usage,
        }
    }
}

/// Drives runs through the stage agents.
///
/// # Architecture
/// - Sequential stages: each sees only the inputs and earlier outputs
/// - Build-once routing: the router is shared read-only by every agent
/// - Pure fan-in: synthesis never calls a model
/// - Fallback: any stage failure yields the STOP_WORK report
pub struct PipelineOrchestrator {
    agents: Vec<Arc<dyn StageAgent>>,
    synthesis: SynthesisAgent,
}

impl fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages: Vec<Stage> = self.agents.iter().map(|a| a.stage()).collect();
        f.debug_struct("PipelineOrchestrator")
            .field("stages", &stages)
            .finish()
    }
}

impl PipelineOrchestrator {
    pub fn builder() -> PipelineOrchestratorBuilder {
        PipelineOrchestratorBuilder::new()
    }

    /// Build the router from `config` through `registry`, with `config`
    /// supplying timeouts and stage overrides.
    pub fn from_config(
        config: &RuntimeConfig,
        registry: &ProviderRegistry,
    ) -> Result<Self, PipelineError> {
        let router = config.build_router(registry)?;
        Self::builder()
            .router(Arc::new(router))
            .config(config.clone())
            .build()
    }

    pub async fn run_pipeline(
        &self,
        checklist: Checklist,
        weather: WeatherConditions,
        reference: ReferenceData,
    ) -> PipelineResult {
        self.run(PipelineInput::new(checklist, weather, reference)).await
    }

    pub async fn run(&self, input: PipelineInput) -> PipelineResult {
        self.run_pipeline_cancellable(input, &CancellationToken::new())
            .await
    }

    /// Run until done, failed, or `cancel` fires. A cancelled run yields the
    /// fallback report.
    pub async fn run_pipeline_cancellable(
        &self,
        input: PipelineInput,
        cancel: &CancellationToken,
    ) -> PipelineResult {
        let mut ledger = RunLedger::start();
        let current_time = input.current_time.unwrap_or(ledger.started_at);
        let mut ctx = PipelineContext::new(PipelineInputs {
            checklist: input.checklist,
            weather: input.weather,
            reference: input.reference,
            current_time,
        });

        for agent in &self.agents {
            let stage = agent.stage();
            tracing::info!(stage = %stage, state = %PipelineState::running(stage), "stage started");

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    StageResponse::failed(stage, StageErrorKind::Cancelled, StageError::Cancelled.to_string())
                }
                response = agent.execute(&ctx) => response,
            };
            ledger.record(&response);

            if !response.success {
                return Self::fall_back(&response, ledger);
            }
            tracing::info!(
                stage = %stage,
                model = response.model_used.as_deref().unwrap_or("-"),
                execution_time_ms = response.execution_time_ms,
                "stage finished"
            );
            ctx = ctx.with_output(stage, response.output_data);
        }

        tracing::info!(stage = %Stage::Synthesis, state = %PipelineState::Synthesizing, "stage started");
        if cancel.is_cancelled() {
            let response = StageResponse::failed(
                Stage::Synthesis,
                StageErrorKind::Cancelled,
                StageError::Cancelled.to_string(),
            );
            ledger.record(&response);
            return Self::fall_back(&response, ledger);
        }

        let started = Instant::now();
        let report = match self.synthesis.synthesize(&ctx) {
            Ok(report) => report,
            Err(e) => {
                let response = StageResponse::failed(Stage::Synthesis, e.kind(), e.to_string());
                ledger.record(&response);
                return Self::fall_back(&response, ledger);
            }
        };
        let response = SynthesisAgent::response(&report, started);
        ledger.record(&response);
        tracing::info!(
            stage = %Stage::Synthesis,
            decision = %report.executive_summary.decision,
            report_id = %report.metadata.report_id,
            "stage finished"
        );

        let mut stage_outputs = ctx.into_outputs();
        stage_outputs.insert(Stage::Synthesis, response.output_data);

        PipelineResult {
            stage_outputs,
            final_report: Report::Complete(Box::new(report)),
            timing: ledger.finish(),
            fallback: false,
            error: None,
            state: PipelineState::Done,
        }
    }

    /// Run independent pipelines, at most `concurrency` at a time. Results
    /// come back in input order.
    pub async fn run_many(
        &self,
        inputs: Vec<PipelineInput>,
        concurrency: usize,
    ) -> Vec<PipelineResult> {
        stream::iter(inputs)
            .map(|input| self.run(input))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    fn fall_back(failed: &StageResponse, ledger: RunLedger) -> PipelineResult {
        let message = failed.error.clone().unwrap_or_default();
        let error = match failed.error_kind {
            Some(StageErrorKind::Cancelled) => message,
            _ => format!("{} stage failed: {}", failed.stage, message),
        };
        tracing::warn!(stage = %failed.stage, error = %error, "pipeline falling back to STOP_WORK");

        PipelineResult {
            stage_outputs: BTreeMap::new(),
            final_report: Report::Fallback(FallbackReport::new(error.clone(), Utc::now())),
            timing: ledger.finish(),
            fallback: true,
            error: Some(error),
            state: PipelineState::Failed,
        }
    }
}

/// Builder for PipelineOrchestrator.
pub struct PipelineOrchestratorBuilder {
    router: Option<Arc<CapabilityRouter>>,
    config: Option<RuntimeConfig>,
    overrides: Option<Arc<dyn StageOverrideStore>>,
    default_timeout: Option<Duration>,
    agents: BTreeMap<Stage, Arc<dyn StageAgent>>,
}

impl PipelineOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            router: None,
            config: None,
            overrides: None,
            default_timeout: None,
            agents: BTreeMap::new(),
        }
    }

    pub fn router(mut self, router: Arc<CapabilityRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Timeouts and stage overrides from a runtime config.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Stage overrides consulted before each task. Takes precedence over the
    /// config's `stages` table.
    pub fn override_store(mut self, store: Arc<dyn StageOverrideStore>) -> Self {
        self.overrides = Some(store);
        self
    }

    /// Per-stage timeout when no override sets one.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Replace the built-in agent for a model-backed stage.
    pub fn agent(mut self, agent: Arc<dyn StageAgent>) -> Self {
        self.agents.insert(agent.stage(), agent);
        self
    }

    pub fn build(mut self) -> Result<PipelineOrchestrator, PipelineError> {
        let router = self
            .router
            .ok_or_else(|| PipelineError::NotConfigured("No router set".to_string()))?;
        if self.agents.contains_key(&Stage::Synthesis) {
            return Err(PipelineError::NotConfigured(
                "the synthesis stage cannot be replaced".to_string(),
            ));
        }

        let timeout = self
            .default_timeout
            .or_else(|| self.config.as_ref().map(|c| c.default_timeout))
            .unwrap_or(DEFAULT_STAGE_TIMEOUT);
        let overrides = self.overrides.or_else(|| {
            self.config
                .map(|c| Arc::new(c) as Arc<dyn StageOverrideStore>)
        });

        let build = BuiltIn {
            router: &router,
            timeout,
            overrides: overrides.as_ref(),
        };
        let mut agents = Vec::with_capacity(MODEL_STAGES.len());
        for stage in MODEL_STAGES {
            let agent = match self.agents.remove(&stage) {
                Some(agent) => agent,
                None => match stage {
                    Stage::Validation => build.agent(ValidatorProfile),
                    Stage::RiskAssessment => build.agent(RiskAssessorProfile),
                    _ => build.agent(IncidentPredictorProfile),
                },
            };
            agents.push(agent);
        }

        Ok(PipelineOrchestrator {
            agents,
            synthesis: SynthesisAgent::new(),
        })
    }
}

impl Default for PipelineOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared wiring for the built-in model-backed agents.
struct BuiltIn<'a> {
    router: &'a Arc<CapabilityRouter>,
    timeout: Duration,
    overrides: Option<&'a Arc<dyn StageOverrideStore>>,
}

impl BuiltIn<'_> {
    fn agent<P: StagePrompt + 'static>(&self, profile: P) -> Arc<dyn StageAgent> {
        let mut agent = LlmStageAgent::new(profile, Arc::clone(self.router)).with_timeout(self.timeout);
        if let Some(store) = self.overrides {
            agent = agent.with_overrides(Arc::clone(store));
        }
        Arc::new(agent)
    }
}
