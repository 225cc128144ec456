//! Model adapter abstractions for jha-runtime.
//!
//! This module defines the [`ModelAdapter`] trait every back-end implements,
//! the capability vocabulary the router matches on, and the concrete
//! adapters. HTTP adapters are feature-gated; [`ScriptedAdapter`] is always
//! available for tests and offline runs.
//!
//! ## Security
//!
//! All HTTP adapters use the [`secrets`] module for credential handling.
//! See [`ApiCredential`] for the recommended patterns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub mod catalog;
mod factory;
pub mod retry;
mod scripted;
pub mod secrets;

#[cfg(any(feature = "anthropic", feature = "openrouter", feature = "google"))]
mod http;

#[cfg(feature = "anthropic")]
mod anthropic;
#[cfg(feature = "google")]
mod gemini;
#[cfg(feature = "openrouter")]
mod openrouter;

pub use factory::{AdapterFactory, ProviderRegistry};
pub use retry::RetryPolicy;
pub use scripted::{ScriptedAdapter, ScriptedAdapterFactory, ScriptedCall, ScriptedReply};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicAdapter, AnthropicAdapterFactory};
#[cfg(feature = "google")]
pub use gemini::{GeminiAdapter, GeminiAdapterFactory};
#[cfg(feature = "openrouter")]
pub use openrouter::{OpenRouterAdapter, OpenRouterAdapterFactory};

/// Model vendor an adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    Google,
    OpenAi,
    OpenRouter,
    Local,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::OpenAi => "openai",
            Provider::OpenRouter => "openrouter",
            Provider::Local => "local",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Provider::Anthropic),
            "google" | "gemini" => Ok(Provider::Google),
            "openai" => Ok(Provider::OpenAi),
            "openrouter" => Ok(Provider::OpenRouter),
            "local" => Ok(Provider::Local),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// A reasoning trait an adapter advertises and a task may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    FastReasoning,
    DeepReasoning,
    StructuredOutput,
    LongContext,
    Creative,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::FastReasoning => "fast_reasoning",
            Capability::DeepReasoning => "deep_reasoning",
            Capability::StructuredOutput => "structured_output",
            Capability::LongContext => "long_context",
            Capability::Creative => "creative",
        };
        f.write_str(s)
    }
}

/// Ordered so routing logs and explanations are stable.
pub type CapabilitySet = BTreeSet<Capability>;

/// Price in USD per 1k tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenCost {
    pub input: f64,
    pub output: f64,
}

impl TokenCost {
    pub const FREE: TokenCost = TokenCost {
        input: 0.0,
        output: 0.0,
    };

    pub const fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }

    /// Estimated cost of one call.
    pub fn estimate(&self, usage: &TokenUsage) -> f64 {
        (usage.prompt_tokens as f64 / 1000.0) * self.input
            + (usage.completion_tokens as f64 / 1000.0) * self.output
    }
}

/// Token usage reported for one generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Output format requested from the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

/// Sampling parameters for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateParams {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub response_format: ResponseFormat,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
            response_format: ResponseFormat::Json,
        }
    }
}

/// Text generated by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    /// Model id the upstream reported, which may be more specific than the configured one.
    pub model: String,
    pub execution_time_ms: u64,
    pub token_usage: TokenUsage,
}

/// Errors from model adapters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Model adapter abstraction; the adapter set is open.
///
/// Adapters hold no per-call state: any number of pipeline runs may share
/// one adapter concurrently.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Configured model id, used for routing designations and pins.
    fn model(&self) -> &str;

    fn capabilities(&self) -> &CapabilitySet;

    fn cost_per_1k_tokens(&self) -> TokenCost;

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerateParams,
    ) -> Result<Generation, ProviderError>;

    /// Check whether the adapter is usable, without a network call where possible.
    async fn health_check(&self) -> bool {
        true
    }

    /// Estimate tokens for a prompt.
    fn estimate_tokens(&self, text: &str) -> u32 {
        // ~4 chars per token
        (text.len() / 4) as u32
    }

    /// Human-readable `provider/model` label.
    fn label(&self) -> String {
        format!("{}/{}", self.provider(), self.model())
    }
}

/// Parse a list of capability names, as written in configuration.
pub fn parse_capabilities(names: &[String]) -> Result<CapabilitySet, ProviderError> {
    names
        .iter()
        .map(|name| {
            serde_json::from_value::<Capability>(serde_json::Value::String(name.clone())).map_err(
                |_| ProviderError::NotConfigured(format!("unknown capability '{}'", name)),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_round_trips() {
        for provider in [
            Provider::Anthropic,
            Provider::Google,
            Provider::OpenAi,
            Provider::OpenRouter,
            Provider::Local,
        ] {
            assert_eq!(provider.as_str().parse::<Provider>().unwrap(), provider);
            let json = serde_json::to_string(&provider).unwrap();
            assert_eq!(json, format!("\"{}\"", provider));
        }
        assert_eq!("Gemini".parse::<Provider>().unwrap(), Provider::Google);
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn test_cost_estimate() {
        let cost = TokenCost::new(0.003, 0.015);
        let usage = TokenUsage::new(2000, 1000);
        assert!((cost.estimate(&usage) - 0.021).abs() < 1e-9);
        assert_eq!(TokenCost::FREE.estimate(&usage), 0.0);
    }

    #[test]
    fn test_parse_capabilities() {
        let caps = parse_capabilities(&["fast_reasoning".into(), "structured_output".into()]).unwrap();
        assert!(caps.contains(&Capability::FastReasoning));
        assert_eq!(caps.len(), 2);
        assert!(parse_capabilities(&["telepathy".into()]).is_err());
    }
}
