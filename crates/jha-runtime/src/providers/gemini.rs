//! Google Gemini adapter (`generateContent` REST API).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::catalog::{self, ModelProfile, GEMINI_DEFAULT_MODEL};
use super::factory::AdapterFactory;
use super::http;
use super::retry::RetryPolicy;
use super::secrets::{ApiCredential, CredentialSource};
use super::{
    CapabilitySet, GenerateParams, Generation, ModelAdapter, Provider, ProviderError,
    ResponseFormat, TokenCost, TokenUsage,
};

pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiAdapter {
    credential: ApiCredential,
    base_url: String,
    model: String,
    profile: ModelProfile,
    client: reqwest::Client,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for GeminiAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiAdapter")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiAdapter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        let model = model.into();
        Ok(Self {
            credential: ApiCredential::new(api_key, CredentialSource::Programmatic, "Google API key"),
            base_url: DEFAULT_BASE_URL.to_string(),
            profile: catalog::gemini(&model),
            model,
            client: http::build_client(http::DEFAULT_REQUEST_TIMEOUT)?,
            request_timeout: http::DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        })
    }

    pub fn from_config(settings: &JsonValue) -> Result<Self, ProviderError> {
        let credential =
            ApiCredential::from_config_or_env(settings, GOOGLE_API_KEY_ENV, "Google API key")?;
        let model = settings["model"]
            .as_str()
            .unwrap_or(GEMINI_DEFAULT_MODEL)
            .to_string();
        let request_timeout = http::request_timeout(settings)?;

        Ok(Self {
            credential,
            base_url: http::base_url(settings, DEFAULT_BASE_URL)?,
            profile: http::profile(settings, catalog::gemini(&model))?,
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

    async fn send(&self, request: &GenerateRequest<'_>) -> Result<GenerateResponse, ProviderError> {
        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", self.credential.expose())
            .json(request)
            .send()
            .await
            .map_err(|e| http::map_send_error(e, self.request_timeout))?;

        http::check_status(response)
            .await?
            .json::<GenerateResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UsageMetadata {
    prompt_token_count: u32,
    candidates_token_count: u32,
}

#[async_trait]
impl ModelAdapter for GeminiAdapter {
    fn provider(&self) -> Provider {
        Provider::Google
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
        let request = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_tokens,
                response_mime_type: (params.response_format == ResponseFormat::Json)
                    .then_some("application/json"),
            },
        };

        let label = self.label();
        let body = self.retry.run(&label, || self.send(&request)).await?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| ProviderError::ParseError("response has no candidates".to_string()))?;
        let token_usage = body
            .usage_metadata
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        Ok(Generation {
            text,
            model: body.model_version.unwrap_or_else(|| self.model.clone()),
            execution_time_ms: started.elapsed().as_millis() as u64,
            token_usage,
        })
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }
}

/// Factory for `type: google` adapters.
///
/// ## Configuration Format
/// ```yaml
/// - type: google
///   model: gemini-2.5-flash      # optional
///   api_key_env: GOOGLE_API_KEY  # optional, or inline api_key
/// ```
pub struct GeminiAdapterFactory;

impl AdapterFactory for GeminiAdapterFactory {
    fn adapter_type(&self) -> &'static str {
        "google"
    }

    fn create(&self, settings: &JsonValue) -> Result<Arc<dyn ModelAdapter>, ProviderError> {
        Ok(Arc::new(GeminiAdapter::from_config(settings)?))
    }

    fn validate_config(&self, settings: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(settings, GOOGLE_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Google API key required: set 'api_key' in config or {} env",
                GOOGLE_API_KEY_ENV
            )));
        }
        http::base_url(settings, DEFAULT_BASE_URL)?;
        http::request_timeout(settings)?;
        RetryPolicy::from_settings(settings)?;
        let model = settings["model"].as_str().unwrap_or(GEMINI_DEFAULT_MODEL);
        http::profile(settings, catalog::gemini(model)).map(|_| ())
    }

    fn description(&self) -> &'static str {
        "Google Gemini via generateContent"
    }
}
