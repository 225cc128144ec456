//! OpenRouter adapter (OpenAI-compatible chat completions).
//!
//! One OpenRouter key reaches many upstream models, so capabilities and
//! price come from the routed model id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::catalog::{self, ModelProfile, OPENROUTER_DEFAULT_MODEL};
use super::factory::AdapterFactory;
use super::http;
use super::retry::RetryPolicy;
use super::secrets::{ApiCredential, CredentialSource};
use super::{
    CapabilitySet, GenerateParams, Generation, ModelAdapter, Provider, ProviderError,
    ResponseFormat, TokenCost, TokenUsage,
};

pub const OPENROUTER_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_APP_TITLE: &str = "JHA Pipeline";

pub struct OpenRouterAdapter {
    credential: ApiCredential,
    base_url: String,
    model: String,
    profile: ModelProfile,
    referer: Option<String>,
    app_title: String,
    client: reqwest::Client,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for OpenRouterAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterAdapter")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenRouterAdapter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        let model = model.into();
        Ok(Self {
            credential: ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                "OpenRouter API key",
            ),
            base_url: DEFAULT_BASE_URL.to_string(),
            profile: catalog::openrouter(&model),
            model,
            referer: None,
            app_title: DEFAULT_APP_TITLE.to_string(),
            client: http::build_client(http::DEFAULT_REQUEST_TIMEOUT)?,
            request_timeout: http::DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        })
    }

    pub fn from_config(settings: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            settings,
            OPENROUTER_API_KEY_ENV,
            "OpenRouter API key",
        )?;
        let model = settings["model"]
            .as_str()
            .unwrap_or(OPENROUTER_DEFAULT_MODEL)
            .to_string();
        let request_timeout = http::request_timeout(settings)?;

        Ok(Self {
            credential,
            base_url: http::base_url(settings, DEFAULT_BASE_URL)?,
            profile: http::profile(settings, catalog::openrouter(&model))?,
            model,
            referer: settings["referer"].as_str().map(str::to_string),
            app_title: settings["app_title"]
                .as_str()
                .unwrap_or(DEFAULT_APP_TITLE)
                .to_string(),
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

    async fn send(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, ProviderError> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .header("X-Title", &self.app_title);
        if let Some(referer) = &self.referer {
            builder = builder.header("HTTP-Referer", referer);
        }

        let response = builder
            .json(request)
            .send()
            .await
            .map_err(|e| http::map_send_error(e, self.request_timeout))?;

        http::check_status(response)
            .await?
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<JsonMode>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonMode {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[async_trait]
impl ModelAdapter for OpenRouterAdapter {
    fn provider(&self) -> Provider {
        Provider::OpenRouter
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
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            response_format: (params.response_format == ResponseFormat::Json)
                .then_some(JsonMode { kind: "json_object" }),
        };

        let label = self.label();
        let body = self.retry.run(&label, || self.send(&request)).await?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::ParseError("response has no choices".to_string()))?;
        let token_usage = body
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
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

/// Factory for `type: openrouter` adapters.
///
/// ## Configuration Format
/// ```yaml
/// - type: openrouter
///   model: google/gemini-2.0-flash-exp:free   # optional
///   api_key_env: OPENROUTER_API_KEY           # optional, or inline api_key
///   referer: https://your.site                # optional HTTP-Referer
///   app_title: Site Safety                    # optional X-Title
///   capabilities: [fast_reasoning]            # optional override
///   cost: { input: 0.0, output: 0.0 }         # optional override
/// ```
pub struct OpenRouterAdapterFactory;

impl AdapterFactory for OpenRouterAdapterFactory {
    fn adapter_type(&self) -> &'static str {
        "openrouter"
    }

    fn create(&self, settings: &JsonValue) -> Result<Arc<dyn ModelAdapter>, ProviderError> {
        Ok(Arc::new(OpenRouterAdapter::from_config(settings)?))
    }

    fn validate_config(&self, settings: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(settings, OPENROUTER_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "OpenRouter API key required: set 'api_key' in config or {} env",
                OPENROUTER_API_KEY_ENV
            )));
        }
        http::base_url(settings, DEFAULT_BASE_URL)?;
        http::request_timeout(settings)?;
        RetryPolicy::from_settings(settings)?;
        let model = settings["model"].as_str().unwrap_or(OPENROUTER_DEFAULT_MODEL);
        http::profile(settings, catalog::openrouter(model)).map(|_| ())
    }

    fn description(&self) -> &'static str {
        "OpenRouter chat completions (OpenAI-compatible)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_model_is_free() {
        let adapter = OpenRouterAdapter::new("key", OPENROUTER_DEFAULT_MODEL).unwrap();
        assert_eq!(adapter.provider(), Provider::OpenRouter);
        assert_eq!(adapter.cost_per_1k_tokens(), TokenCost::FREE);
    }

    #[test]
    fn test_from_config_reads_headers() {
        let adapter = OpenRouterAdapter::from_config(&json!({
            "api_key": "k",
            "model": "openai/gpt-4o",
            "referer": "https://safety.example",
            "app_title": "Site Safety"
        }))
        .unwrap();
        assert_eq!(adapter.model(), "openai/gpt-4o");
        assert_eq!(adapter.referer.as_deref(), Some("https://safety.example"));
        assert_eq!(adapter.app_title, "Site Safety");
    }

    #[test]
    fn test_json_mode_serialization() {
        let request = ChatRequest {
            model: "m",
            messages: [ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.3,
            max_tokens: None,
            response_format: Some(JsonMode { kind: "json_object" }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert!(value.get("max_tokens").is_none());
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let adapter = OpenRouterAdapter::new("sk-or-secret-999", OPENROUTER_DEFAULT_MODEL).unwrap();
        assert!(!format!("{:?}", adapter).contains("sk-or-secret-999"));
    }
}
