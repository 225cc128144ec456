//! # jha-runtime
//!
//! Model-backed execution of the job hazard analysis pipeline.
//!
//! This crate wraps the deterministic logic in `jha-core` with everything
//! that talks to a model:
//! - the [`ModelAdapter`] trait and feature-gated HTTP adapters
//! - the [`CapabilityRouter`] that picks an adapter per task
//! - the stage agents and their prompts
//! - [`PipelineOrchestrator`], which runs the stages and falls back to a
//!   STOP_WORK report on any failure
//!
//! ## Important
//!
//! Every failure inside a run becomes part of the result. A run never
//! returns an error; check [`PipelineResult::fallback`] instead.
//!
//! ## Example
//!
//! ```rust,ignore
//! use jha_runtime::{PipelineOrchestrator, ProviderRegistry, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_file("jha.yaml")?;
//! let orchestrator = PipelineOrchestrator::from_config(&config, &ProviderRegistry::with_defaults())?;
//!
//! let result = orchestrator.run_pipeline(checklist, weather, reference).await;
//! if result.fallback {
//!     eprintln!("manual review required: {}", result.error.unwrap_or_default());
//! }
//! ```

pub mod agents;
pub mod config;
pub mod context;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod router;
pub mod task;
pub mod usage;

pub use agents::{StageAgent, StageError, StageErrorKind, SynthesisAgent};
pub use config::{RuntimeConfig, StageOverride, StageOverrideStore};
pub use context::{PipelineContext, PipelineInputs};
pub use orchestrator::{
    PipelineError, PipelineInput, PipelineOrchestrator, PipelineResult, PipelineState,
    StageTiming, TimingMetadata,
};
pub use providers::{
    Capability, CapabilitySet, ModelAdapter, Provider, ProviderError, ProviderRegistry,
    ScriptedAdapter, ScriptedReply,
};
pub use router::{CapabilityRouter, RouteDecision, RouteReason, RoutingError, RoutingMode};
pub use task::{StageResponse, StageTask};
pub use usage::RunUsage;
