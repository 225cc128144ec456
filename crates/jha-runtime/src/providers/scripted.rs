//! Scripted adapter: canned replies instead of a model.
//!
//! Used by tests and for offline dry runs. Replies are resolved per call:
//! 1. the first rule whose marker appears in the prompt (rules repeat)
//! 2. the next queued reply (each is used once)
//! 3. the default reply, if any
//!
//! Every call is recorded for later inspection.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use jha_core::Stage;

use super::factory::AdapterFactory;
use super::{
    parse_capabilities, Capability, CapabilitySet, GenerateParams, Generation, ModelAdapter,
    Provider, ProviderError, TokenCost, TokenUsage,
};
use crate::prompts::stage_marker;

/// A canned outcome for one call.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedReply {
    Text(String),
    Error(ProviderError),
    /// Wait, then resolve the inner reply.
    Delayed(Duration, Box<ScriptedReply>),
}

impl ScriptedReply {
    pub fn text(text: impl Into<String>) -> Self {
        ScriptedReply::Text(text.into())
    }

    /// Reply with a JSON object wrapped in a json fence, as chat models do.
    pub fn json(value: &JsonValue) -> Self {
        ScriptedReply::Text(format!("```json\n{}\n```", value))
    }

    pub fn error(error: ProviderError) -> Self {
        ScriptedReply::Error(error)
    }

    pub fn delayed(self, delay: Duration) -> Self {
        ScriptedReply::Delayed(delay, Box::new(self))
    }
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedCall {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

pub struct ScriptedAdapter {
    provider: Provider,
    model: String,
    capabilities: CapabilitySet,
    cost: TokenCost,
    rules: Vec<(String, ScriptedReply)>,
    queue: Mutex<VecDeque<ScriptedReply>>,
    default_reply: Option<ScriptedReply>,
    calls: Mutex<Vec<ScriptedCall>>,
}

impl std::fmt::Debug for ScriptedAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedAdapter")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("capabilities", &self.capabilities)
            .field("rules", &self.rules.len())
            .field("queued", &self.queue.lock().len())
            .finish()
    }
}

impl ScriptedAdapter {
    /// A free adapter advertising every capability, with no replies yet.
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            capabilities: [
                Capability::FastReasoning,
                Capability::DeepReasoning,
                Capability::StructuredOutput,
                Capability::LongContext,
                Capability::Creative,
            ]
            .into_iter()
            .collect(),
            cost: TokenCost::FREE,
            rules: Vec::new(),
            queue: Mutex::new(VecDeque::new()),
            default_reply: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = capabilities.into_iter().collect();
        self
    }

    pub fn with_cost(mut self, cost: TokenCost) -> Self {
        self.cost = cost;
        self
    }

    /// Answer every prompt containing `marker` with `reply`.
    pub fn reply_when(mut self, marker: impl Into<String>, reply: ScriptedReply) -> Self {
        self.rules.push((marker.into(), reply));
        self
    }

    /// Answer every prompt built for `stage` with `reply`.
    pub fn reply_for(self, stage: Stage, reply: ScriptedReply) -> Self {
        self.reply_when(stage_marker(stage), reply)
    }

    pub fn enqueue(self, reply: ScriptedReply) -> Self {
        self.queue.lock().push_back(reply);
        self
    }

    pub fn default_reply(mut self, reply: ScriptedReply) -> Self {
        self.default_reply = Some(reply);
        self
    }

    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn resolve(&self, prompt: &str) -> Option<ScriptedReply> {
        if let Some((_, reply)) = self.rules.iter().find(|(marker, _)| prompt.contains(marker.as_str())) {
            return Some(reply.clone());
        }
        if let Some(reply) = self.queue.lock().pop_front() {
            return Some(reply);
        }
        self.default_reply.clone()
    }
}

#[async_trait]
impl ModelAdapter for ScriptedAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn cost_per_1k_tokens(&self) -> TokenCost {
        self.cost
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerateParams,
    ) -> Result<Generation, ProviderError> {
        let started = Instant::now();
        self.calls.lock().push(ScriptedCall {
            prompt: prompt.to_string(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        });

        let mut reply = self.resolve(prompt).ok_or_else(|| {
            ProviderError::NotConfigured(format!("no scripted reply left for {}", self.label()))
        })?;

        loop {
            match reply {
                ScriptedReply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
                ScriptedReply::Error(e) => return Err(e),
                ScriptedReply::Text(text) => {
                    let token_usage =
                        TokenUsage::new(self.estimate_tokens(prompt), self.estimate_tokens(&text));
                    return Ok(Generation {
                        text,
                        model: self.model.clone(),
                        execution_time_ms: started.elapsed().as_millis() as u64,
                        token_usage,
                    });
                }
            }
        }
    }
}

/// Settings accepted by `type: scripted` adapter entries.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct ScriptedSettings {
    provider: String,
    model: String,
    capabilities: Option<Vec<String>>,
    cost: TokenCost,
    /// Stage name to reply text.
    replies: BTreeMap<String, String>,
    default_reply: Option<String>,
}

impl Default for ScriptedSettings {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            model: "scripted".to_string(),
            capabilities: None,
            cost: TokenCost::FREE,
            replies: BTreeMap::new(),
            default_reply: None,
        }
    }
}

/// Factory for `type: scripted` adapters.
///
/// ## Configuration Format
/// ```yaml
/// - type: scripted
///   provider: local                  # optional
///   model: offline-fixture           # optional
///   capabilities: [fast_reasoning]   # optional, defaults to all
///   cost: { input: 0.0, output: 0.0 }
///   replies:
///     validation: '{"validation": {"qualityScore": 8}}'
///   default_reply: '{}'
/// ```
pub struct ScriptedAdapterFactory;

impl ScriptedAdapterFactory {
    fn parse(settings: &JsonValue) -> Result<ScriptedAdapter, ProviderError> {
        let parsed: ScriptedSettings = if settings.is_null() {
            ScriptedSettings::default()
        } else {
            serde_json::from_value(settings.clone())
                .map_err(|e| ProviderError::NotConfigured(format!("scripted adapter: {}", e)))?
        };

        let provider = parsed
            .provider
            .parse::<Provider>()
            .map_err(ProviderError::NotConfigured)?;

        let mut adapter = ScriptedAdapter::new(provider, parsed.model).with_cost(parsed.cost);
        if let Some(names) = &parsed.capabilities {
            adapter = adapter.with_capabilities(parse_capabilities(names)?);
        }
        for (stage, text) in parsed.replies {
            let stage = stage.parse::<Stage>().map_err(ProviderError::NotConfigured)?;
            adapter = adapter.reply_for(stage, ScriptedReply::Text(text));
        }
        if let Some(text) = parsed.default_reply {
            adapter = adapter.default_reply(ScriptedReply::Text(text));
        }
        Ok(adapter)
    }
}

impl AdapterFactory for ScriptedAdapterFactory {
    fn adapter_type(&self) -> &'static str {
        "scripted"
    }

    fn create(&self, settings: &JsonValue) -> Result<Arc<dyn ModelAdapter>, ProviderError> {
        Ok(Arc::new(Self::parse(settings)?))
    }

    fn validate_config(&self, settings: &JsonValue) -> Result<(), ProviderError> {
        Self::parse(settings).map(|_| ())
    }

    fn description(&self) -> &'static str {
        "Scripted replies for tests and offline runs"
    }
}
