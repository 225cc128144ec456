//! Runtime configuration: adapters, routing and per-stage overrides.
//!
//! ## Configuration Format
//! ```yaml
//! default_timeout: 90s
//! routing:
//!   mode: permissive               # or strict
//!   designations: { anthropic: claude-sonnet-4-20250514 }
//! adapters:
//!   - type: openrouter
//!     model: google/gemini-2.0-flash-exp:free
//!     api_key_env: OPENROUTER_API_KEY
//! stages:
//!   validation: { temperature: 0.2, max_tokens: 2500, timeout: 45s }
//!   incident_prediction: { provider: anthropic }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use jha_core::{load_document, InputError, Stage};

use crate::providers::{Provider, ProviderError, ProviderRegistry};
use crate::router::{CapabilityRouter, RoutingError, RoutingMode};

/// Stage timeout when neither the config nor an override sets one.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(90);

/// Serde helpers for humantime strings such as `90s` or `1m 30s`.
pub(crate) mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            duration: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match duration {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                None => Ok(None),
                Some(s) => humantime::parse_duration(&s)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
            }
        }
    }
}

/// Errors from loading or applying configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] InputError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Adapter #{index} ({adapter_type}): {source}")]
    Adapter {
        index: usize,
        adapter_type: String,
        #[source]
        source: ProviderError,
    },

    #[error("Routing configuration error: {0}")]
    Routing(#[from] RoutingError),
}

/// Per-stage settings that replace the stage defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageOverride {
    /// Pin the stage to the adapter serving this model id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(
        with = "humantime_duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
}

impl StageOverride {
    fn validate(&self, stage: Stage) -> Result<(), ConfigError> {
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::Invalid(format!(
                    "stages.{}.temperature must be within [0, 2], got {}",
                    stage, t
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(ConfigError::Invalid(format!(
                "stages.{}.max_tokens must be greater than 0",
                stage
            )));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(ConfigError::Invalid(format!(
                "stages.{}.timeout must be non-zero",
                stage
            )));
        }
        Ok(())
    }
}

/// Source of per-stage overrides, consulted before each stage builds its task.
pub trait StageOverrideStore: Send + Sync {
    fn stage_override(&self, stage: Stage) -> Option<StageOverride>;
}

impl StageOverrideStore for BTreeMap<Stage, StageOverride> {
    fn stage_override(&self, stage: Stage) -> Option<StageOverride> {
        self.get(&stage).cloned()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingConfig {
    pub mode: RoutingMode,
    /// Adapter model served for each preferred provider.
    pub designations: BTreeMap<Provider, String>,
}

/// One adapter entry: a registry `type` plus that factory's settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterSpec {
    #[serde(rename = "type")]
    pub adapter_type: String,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl AdapterSpec {
    pub fn new(adapter_type: impl Into<String>) -> Self {
        Self {
            adapter_type: adapter_type.into(),
            settings: Map::new(),
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    fn settings_value(&self) -> Value {
        Value::Object(self.settings.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    #[serde(with = "humantime_duration")]
    pub default_timeout: Duration,
    pub routing: RoutingConfig,
    pub adapters: Vec<AdapterSpec>,
    pub stages: BTreeMap<Stage, StageOverride>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_STAGE_TIMEOUT,
            routing: RoutingConfig::default(),
            adapters: Vec::new(),
            stages: BTreeMap::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml).map_err(InputError::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(InputError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.yaml`, `.yml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = load_document(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "default_timeout must be non-zero".to_string(),
            ));
        }
        for (stage, stage_override) in &self.stages {
            if !stage.uses_model() {
                return Err(ConfigError::Invalid(format!(
                    "stages.{} cannot be overridden: the stage does not call a model",
                    stage
                )));
            }
            stage_override.validate(*stage)?;
        }
        Ok(())
    }

    /// Check every adapter entry against the registry without building it.
    pub fn validate_adapters(&self, registry: &ProviderRegistry) -> Result<(), ConfigError> {
        for (index, spec) in self.adapters.iter().enumerate() {
            registry
                .validate(&spec.adapter_type, &spec.settings_value())
                .map_err(|source| ConfigError::Adapter {
                    index,
                    adapter_type: spec.adapter_type.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Build every adapter through `registry` and assemble the router.
    pub fn build_router(&self, registry: &ProviderRegistry) -> Result<CapabilityRouter, ConfigError> {
        self.validate()?;

        let mut builder = CapabilityRouter::builder().mode(self.routing.mode);
        for (index, spec) in self.adapters.iter().enumerate() {
            let adapter = registry
                .create(&spec.adapter_type, &spec.settings_value())
                .map_err(|source| ConfigError::Adapter {
                    index,
                    adapter_type: spec.adapter_type.clone(),
                    source,
                })?;
            tracing::debug!(adapter = %adapter.label(), "adapter registered");
            builder = builder.adapter(adapter);
        }
        for (provider, model) in &self.routing.designations {
            builder = builder.designate(*provider, model.clone());
        }

        Ok(builder.build()?)
    }

    /// Timeout for `stage`: its override, else the default.
    pub fn stage_timeout(&self, stage: Stage) -> Duration {
        self.stages
            .get(&stage)
            .and_then(|o| o.timeout)
            .unwrap_or(self.default_timeout)
    }
}

impl StageOverrideStore for RuntimeConfig {
    fn stage_override(&self, stage: Stage) -> Option<StageOverride> {
        self.stages.get(&stage).cloned()
    }
}
