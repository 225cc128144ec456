//! Plumbing shared by the HTTP adapters.

use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode};
use serde_json::Value as JsonValue;
use std::time::Duration;

use super::catalog::ModelProfile;
use super::{parse_capabilities, ProviderError, TokenCost};

/// Client-side ceiling for one HTTP request; stages impose their own, shorter timeout.
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const MAX_ERROR_BODY: usize = 500;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::HttpError(format!("failed to build HTTP client: {}", e)))
}

/// `request_timeout` from settings, as a humantime string.
pub(crate) fn request_timeout(settings: &JsonValue) -> Result<Duration, ProviderError> {
    match settings["request_timeout"].as_str() {
        None => Ok(DEFAULT_REQUEST_TIMEOUT),
        Some(s) => humantime::parse_duration(s).map_err(|e| {
            ProviderError::NotConfigured(format!("invalid request_timeout '{}': {}", s, e))
        }),
    }
}

/// `base_url` from settings. Must be http(s); a trailing slash is dropped.
pub(crate) fn base_url(settings: &JsonValue, default: &str) -> Result<String, ProviderError> {
    let url = settings["base_url"].as_str().unwrap_or(default);
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ProviderError::NotConfigured(
            "base_url must start with http:// or https://".to_string(),
        ));
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// Catalog profile, with `capabilities` and `cost` overridable from settings.
pub(crate) fn profile(
    settings: &JsonValue,
    catalog: ModelProfile,
) -> Result<ModelProfile, ProviderError> {
    let mut profile = catalog;

    if let Some(list) = settings.get("capabilities").filter(|v| !v.is_null()) {
        let names: Vec<String> = serde_json::from_value(list.clone()).map_err(|e| {
            ProviderError::NotConfigured(format!("capabilities must be a list of names: {}", e))
        })?;
        profile.capabilities = parse_capabilities(&names)?;
    }
    if let Some(cost) = settings.get("cost").filter(|v| !v.is_null()) {
        profile.cost = serde_json::from_value::<TokenCost>(cost.clone())
            .map_err(|e| ProviderError::NotConfigured(format!("invalid cost: {}", e)))?;
    }

    Ok(profile)
}

pub(crate) fn map_send_error(e: reqwest::Error, timeout: Duration) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::HttpError(e.to_string())
    }
}

/// Pass successful responses through; turn the rest into provider errors.
pub(crate) async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited {
            retry_after: retry_after(response.headers()),
        });
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ProviderError::AuthError);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::ApiError {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// `error.message` or `error` from a JSON error body, else the raw body.
fn error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<JsonValue>(body) {
        let message = json["error"]["message"]
            .as_str()
            .or_else(|| json["error"].as_str())
            .or_else(|| json["message"].as_str());
        if let Some(message) = message {
            return message.to_string();
        }
    }
    body.chars().take(MAX_ERROR_BODY).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base_url_validation() {
        assert_eq!(
            base_url(&json!({"base_url": "http://localhost:8080/"}), "https://x").unwrap(),
            "http://localhost:8080"
        );
        assert_eq!(base_url(&json!({}), "https://api.example.com/v1").unwrap(), "https://api.example.com/v1");
        assert!(base_url(&json!({"base_url": "ftp://nope"}), "https://x").is_err());
    }

    #[test]
    fn test_profile_overrides() {
        let catalog = super::super::catalog::openrouter("openai/gpt-4o");
        let overridden = profile(
            &json!({"capabilities": ["long_context"], "cost": {"input": 0.0, "output": 0.0}}),
            catalog.clone(),
        )
        .unwrap();
        assert_eq!(overridden.capabilities.len(), 1);
        assert_eq!(overridden.cost, TokenCost::FREE);

        assert_eq!(profile(&json!({}), catalog.clone()).unwrap(), catalog);
        assert!(profile(&json!({"capabilities": ["mind_reading"]}), catalog).is_err());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error": {"message": "bad model"}}"#), "bad model");
        assert_eq!(error_message(r#"{"error": "quota"}"#), "quota");
        assert_eq!(error_message("gateway down"), "gateway down");
    }

    #[test]
    fn test_request_timeout() {
        assert_eq!(request_timeout(&json!({})).unwrap(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(
            request_timeout(&json!({"request_timeout": "30s"})).unwrap(),
            Duration::from_secs(30)
        );
        assert!(request_timeout(&json!({"request_timeout": "soon"})).is_err());
    }
}
