//! Capability router: picks one adapter for a task.
//!
//! Resolution order:
//! 1. `preferred_model` naming a registered model id (explicit pin)
//! 2. `preferred_provider` with a designated adapter
//! 3. the cheapest adapter whose capabilities cover the requirement,
//!    ties going to the earliest registered
//! 4. no capable adapter: the first registered adapter in permissive
//!    mode, [`RoutingError::NoCapableAdapter`] in strict mode
//!
//! Steps 1 and 2 bypass capability filtering. The router is immutable once
//! built and is shared across concurrent runs through an `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use jha_core::Stage;

use crate::providers::{ModelAdapter, Provider};
use crate::task::StageTask;

/// What happens when no adapter covers a task's capabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Fall back to the first registered adapter and log a warning.
    #[default]
    Permissive,
    /// Fail the task.
    Strict,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    #[error("router requires at least one adapter")]
    NoAdapters,

    #[error("designation {provider}/{model} does not match a registered adapter")]
    UnknownDesignation { provider: Provider, model: String },

    #[error("no adapter offers [{required}] for {stage}")]
    NoCapableAdapter { stage: Stage, required: String },
}

/// Why an adapter was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    PinnedModel,
    PreferredProvider,
    CheapestCapable,
    PermissiveFallback,
}

impl fmt::Display for RouteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RouteReason::PinnedModel => "pinned model",
            RouteReason::PreferredProvider => "preferred provider",
            RouteReason::CheapestCapable => "cheapest capable adapter",
            RouteReason::PermissiveFallback => "no capable adapter, first registered",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDecision {
    /// Index into [`CapabilityRouter::adapters`].
    pub index: usize,
    pub reason: RouteReason,
}

pub struct CapabilityRouter {
    adapters: Vec<Arc<dyn ModelAdapter>>,
    designations: BTreeMap<Provider, usize>,
    mode: RoutingMode,
}

impl CapabilityRouter {
    /// Permissive router with default designations.
    pub fn new(adapters: Vec<Arc<dyn ModelAdapter>>) -> Result<Self, RoutingError> {
        Self::builder().adapters(adapters).build()
    }

    pub fn builder() -> CapabilityRouterBuilder {
        CapabilityRouterBuilder::default()
    }

    pub fn adapters(&self) -> &[Arc<dyn ModelAdapter>] {
        &self.adapters
    }

    pub fn mode(&self) -> RoutingMode {
        self.mode
    }

    /// Adapter designated for a provider, if any.
    pub fn designated(&self, provider: Provider) -> Option<&Arc<dyn ModelAdapter>> {
        self.designations.get(&provider).map(|&i| &self.adapters[i])
    }

    pub fn route(&self, task: &StageTask) -> Result<Arc<dyn ModelAdapter>, RoutingError> {
        let decision = self.explain(task)?;
        let adapter = &self.adapters[decision.index];
        tracing::debug!(
            stage = %task.task_type,
            adapter = %adapter.label(),
            reason = %decision.reason,
            "task routed"
        );
        Ok(Arc::clone(adapter))
    }

    /// Routing decision for a task, without side effects.
    pub fn explain(&self, task: &StageTask) -> Result<RouteDecision, RoutingError> {
        if let Some(model) = &task.preferred_model {
            match self.adapters.iter().position(|a| a.model() == model) {
                Some(index) => {
                    return Ok(RouteDecision {
                        index,
                        reason: RouteReason::PinnedModel,
                    })
                }
                None => tracing::warn!(
                    stage = %task.task_type,
                    model = %model,
                    "pinned model is not registered, routing by capability"
                ),
            }
        }

        if let Some(index) = task
            .preferred_provider
            .and_then(|p| self.designations.get(&p).copied())
        {
            return Ok(RouteDecision {
                index,
                reason: RouteReason::PreferredProvider,
            });
        }

        let mut best: Option<(usize, f64)> = None;
        for (index, adapter) in self.adapters.iter().enumerate() {
            if !task.required_capabilities.is_subset(adapter.capabilities()) {
                continue;
            }
            let cost = adapter.cost_per_1k_tokens().input;
            match best {
                Some((_, best_cost)) if !(cost < best_cost) => {}
                _ => best = Some((index, cost)),
            }
        }

        if let Some((index, _)) = best {
            return Ok(RouteDecision {
                index,
                reason: RouteReason::CheapestCapable,
            });
        }

        let required = task
            .required_capabilities
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        match self.mode {
            RoutingMode::Strict => Err(RoutingError::NoCapableAdapter {
                stage: task.task_type,
                required,
            }),
            RoutingMode::Permissive => {
                tracing::warn!(
                    stage = %task.task_type,
                    required = %required,
                    fallback = %self.adapters[0].label(),
                    "no adapter offers the required capabilities, using first registered"
                );
                Ok(RouteDecision {
                    index: 0,
                    reason: RouteReason::PermissiveFallback,
                })
            }
        }
    }
}

impl fmt::Debug for CapabilityRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRouter")
            .field(
                "adapters",
                &self.adapters.iter().map(|a| a.label()).collect::<Vec<_>>(),
            )
            .field("mode", &self.mode)
            .finish()
    }
}

#[derive(Default)]
pub struct CapabilityRouterBuilder {
    adapters: Vec<Arc<dyn ModelAdapter>>,
    designations: Vec<(Provider, String)>,
    mode: RoutingMode,
}

impl CapabilityRouterBuilder {
    pub fn adapter(mut self, adapter: Arc<dyn ModelAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn adapters(mut self, adapters: impl IntoIterator<Item = Arc<dyn ModelAdapter>>) -> Self {
        self.adapters.extend(adapters);
        self
    }

    /// Send `preferred_provider == provider` tasks to the adapter serving `model`.
    pub fn designate(mut self, provider: Provider, model: impl Into<String>) -> Self {
        self.designations.push((provider, model.into()));
        self
    }

    pub fn mode(mut self, mode: RoutingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn build(self) -> Result<CapabilityRouter, RoutingError> {
        if self.adapters.is_empty() {
            return Err(RoutingError::NoAdapters);
        }

        // First registered adapter per provider, unless designated explicitly.
        let mut designations = BTreeMap::new();
        for (index, adapter) in self.adapters.iter().enumerate() {
            designations.entry(adapter.provider()).or_insert(index);
        }
        for (provider, model) in self.designations {
            let index = self
                .adapters
                .iter()
                .position(|a| a.provider() == provider && a.model() == model)
                .ok_or(RoutingError::UnknownDesignation {
                    provider,
                    model: model.clone(),
                })?;
            designations.insert(provider, index);
        }

        Ok(CapabilityRouter {
            adapters: self.adapters,
            designations,
            mode: self.mode,
        })
    }
}
