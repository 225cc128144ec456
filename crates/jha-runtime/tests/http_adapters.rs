//! HTTP adapter tests against a mock server.

#![cfg(any(feature = "anthropic", feature = "openrouter", feature = "google"))]

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jha_runtime::providers::{GenerateParams, ResponseFormat, RetryPolicy};
use jha_runtime::{ModelAdapter, ProviderError};

fn fast_retry(max_retries: usize) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        min_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

fn json_params() -> GenerateParams {
    GenerateParams {
        temperature: 0.3,
        max_tokens: Some(3000),
        response_format: ResponseFormat::Json,
    }
}

#[cfg(feature = "anthropic")]
mod anthropic {
    use super::*;
    use jha_runtime::providers::AnthropicAdapter;

    fn adapter(server: &MockServer) -> AnthropicAdapter {
        AnthropicAdapter::new("sk-ant-test", "claude-sonnet-4-5")
            .unwrap()
            .with_base_url(server.uri())
            .with_retry(fast_retry(2))
    }

    fn reply(text: &str) -> serde_json::Value {
        json!({
            "content": [{"type": "text", "text": text}],
            "model": "claude-sonnet-4-5-20250929",
            "usage": {"input_tokens": 1200, "output_tokens": 300}
        })
    }

    #[tokio::test]
    async fn test_messages_request_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({
                "model": "claude-sonnet-4-5",
                "max_tokens": 3000,
                "messages": [{"role": "user", "content": "## TASK"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("{\"ok\": true}")))
            .expect(1)
            .mount(&server)
            .await;

        let generation = adapter(&server).generate("## TASK", &json_params()).await.unwrap();
        assert_eq!(generation.text, "{\"ok\": true}");
        assert_eq!(generation.model, "claude-sonnet-4-5-20250929");
        assert_eq!(generation.token_usage.total_tokens, 1500);
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("{}")))
            .mount(&server)
            .await;

        let generation = adapter(&server).generate("prompt", &json_params()).await.unwrap();
        assert_eq!(generation.text, "{}");
    }

    #[tokio::test]
    async fn test_persistent_rate_limit_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .expect(3)
            .mount(&server)
            .await;

        let err = adapter(&server).generate("prompt", &json_params()).await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::RateLimited {
                retry_after: Some(Duration::from_secs(7))
            }
        );
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = adapter(&server).generate("prompt", &json_params()).await.unwrap_err();
        assert_eq!(err, ProviderError::AuthError);
    }

    #[tokio::test]
    async fn test_api_error_message_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "type": "error",
                "error": {"type": "invalid_request_error", "message": "max_tokens too large"}
            })))
            .mount(&server)
            .await;

        let err = adapter(&server).generate("prompt", &json_params()).await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::ApiError {
                status: 400,
                message: "max_tokens too large".to_string()
            }
        );
    }
}

#[cfg(feature = "openrouter")]
mod openrouter {
    use super::*;
    use jha_runtime::providers::OpenRouterAdapter;

    fn adapter(server: &MockServer) -> OpenRouterAdapter {
        OpenRouterAdapter::new("sk-or-test", "google/gemini-2.0-flash-exp:free")
            .unwrap()
            .with_base_url(server.uri())
            .with_retry(fast_retry(0))
    }

    #[tokio::test]
    async fn test_json_mode_is_requested() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-or-test"))
            .and(body_partial_json(json!({
                "model": "google/gemini-2.0-flash-exp:free",
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"hazards\": []}"}}],
                "usage": {"prompt_tokens": 800, "completion_tokens": 200}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generation = adapter(&server).generate("prompt", &json_params()).await.unwrap();
        assert_eq!(generation.text, "{\"hazards\": []}");
        assert_eq!(generation.model, "google/gemini-2.0-flash-exp:free");
        assert_eq!(generation.token_usage.total_tokens, 1000);
    }

    #[tokio::test]
    async fn test_retry_disabled_surfaces_first_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let err = adapter(&server).generate("prompt", &json_params()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { retry_after: None }));
    }
}

#[cfg(feature = "google")]
mod gemini {
    use super::*;
    use jha_runtime::providers::GeminiAdapter;

    #[tokio::test]
    async fn test_generate_content_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "g-test"))
            .and(body_partial_json(json!({
                "generationConfig": {"responseMimeType": "application/json", "maxOutputTokens": 3000}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "{\"incidentPrediction\": {}}"}]}}],
                "usageMetadata": {"promptTokenCount": 900, "candidatesTokenCount": 100}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = GeminiAdapter::new("g-test", "gemini-2.0-flash")
            .unwrap()
            .with_base_url(server.uri())
            .with_retry(fast_retry(0));

        let generation = adapter.generate("prompt", &json_params()).await.unwrap();
        assert_eq!(generation.text, "{\"incidentPrediction\": {}}");
        assert_eq!(generation.token_usage.total_tokens, 1000);
    }
}
