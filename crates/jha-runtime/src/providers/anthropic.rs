//! Anthropic Claude adapter (Messages API).
//!
//! ## Security
//!
//! This adapter uses the centralized [`ApiCredential`] system for
//! credential handling. See the [`secrets`](super::secrets) module for details.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::catalog::{self, ModelProfile, ANTHROPIC_DEFAULT_MODEL};
use super::factory::AdapterFactory;
use super::http;
use super::retry::RetryPolicy;
use super::secrets::{ApiCredential, CredentialSource};
use super::{
    CapabilitySet, GenerateParams, Generation, ModelAdapter, Provider, ProviderError, TokenCost,
    TokenUsage,
};

/// Environment variable name for Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicAdapter {
    credential: ApiCredential,
    base_url: String,
    model: String,
    profile: ModelProfile,
    client: reqwest::Client,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for AnthropicAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicAdapter")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl AnthropicAdapter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        let model = model.into();
        Ok(Self {
            credential: ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                "Anthropic API key",
            ),
            base_url: DEFAULT_BASE_URL.to_string(),
            profile: catalog::anthropic(&model),
            model,
            client: http::build_client(http::DEFAULT_REQUEST_TIMEOUT)?,
            request_timeout: http::DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        })
    }

    /// Create from adapter settings with environment fallback for the key.
    pub fn from_config(settings: &JsonValue) -> Result<Self, ProviderError> {
        let credential =
            ApiCredential::from_config_or_env(settings, ANTHROPIC_API_KEY_ENV, "Anthropic API key")?;
        let model = settings["model"]
            .as_str()
            .unwrap_or(ANTHROPIC_DEFAULT_MODEL)
            .to_string();
        let request_timeout = http::request_timeout(settings)?;

        Ok(Self {
            credential,
            base_url: http::base_url(settings, DEFAULT_BASE_URL)?,
            profile: http::profile(settings, catalog::anthropic(&model))?,
            model,
            client: http::build_client(request_timeout)?,
            request_timeout,
            retry: RetryPolicy::from_settings(settings)?,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn send(&self, request: &MessagesRequest<'_>) -> Result<MessagesResponse, ProviderError> {
        // Only expose the credential here, at the point of use
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| http::map_send_error(e, self.request_timeout))?;

        http::check_status(response)
            .await?
            .json::<MessagesResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl ModelAdapter for AnthropicAdapter {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.profile.capabilities
    }

    fn cost_per_1k_tokens(&self) -> TokenCost {
        self.profile.cost
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerateParams,
    ) -> Result<Generation, ProviderError> {
        let started = Instant::now();
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: [Message {
                role: "user",
                content: prompt,
            }],
            temperature: params.temperature,
        };

        let label = self.label();
        let body = self.retry.run(&label, || self.send(&request)).await?;

        let text = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        let token_usage = body
            .usage
            .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens))
            .unwrap_or_default();

        Ok(Generation {
            text,
            model: body.model.unwrap_or_else(|| self.model.clone()),
            execution_time_ms: started.elapsed().as_millis() as u64,
            token_usage,
        })
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }
}

/// Factory for `type: anthropic` adapters.
///
/// ## Configuration Format
/// ```yaml
/// - type: anthropic
///   model: claude-sonnet-4-20250514   # optional
///   api_key_env: ANTHROPIC_API_KEY    # optional, or inline api_key
///   base_url: https://...             # optional
///   request_timeout: 120s             # optional
///   retry: { max_retries: 3, min_delay: 500ms, max_delay: 8s }
/// ```
pub struct AnthropicAdapterFactory;

impl AdapterFactory for AnthropicAdapterFactory {
    fn adapter_type(&self) -> &'static str {
        "anthropic"
    }

    fn create(&self, settings: &JsonValue) -> Result<Arc<dyn ModelAdapter>, ProviderError> {
        Ok(Arc::new(AnthropicAdapter::from_config(settings)?))
    }

    fn validate_config(&self, settings: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(settings, ANTHROPIC_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Anthropic API key required: set 'api_key' in config or {} env",
                ANTHROPIC_API_KEY_ENV
            )));
        }
        http::base_url(settings, DEFAULT_BASE_URL)?;
        http::request_timeout(settings)?;
        RetryPolicy::from_settings(settings)?;
        let model = settings["model"].as_str().unwrap_or(ANTHROPIC_DEFAULT_MODEL);
        http::profile(settings, catalog::anthropic(model)).map(|_| ())
    }

    fn description(&self) -> &'static str {
        "Anthropic Claude via the Messages API"
    }
}
