//! Credential handling for model adapters.
//!
//! Keys are wrapped in [`SecretString`] as soon as they are read, so they
//! cannot show up in `Debug`/`Display` output, logs or error messages.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::providers::secrets::ApiCredential;
//!
//! // Config `api_key`, else the env var named by config `api_key_env`,
//! // else the adapter's default env var.
//! let cred = ApiCredential::from_config_or_env(&settings, "OPENROUTER_API_KEY", "OpenRouter API key")?;
//!
//! // Explicit exposure at the point of use
//! request.header("x-api-key", cred.expose());
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Config key holding an inline API key.
pub const API_KEY_FIELD: &str = "api_key";

/// Config key naming the environment variable to read the key from.
pub const API_KEY_ENV_FIELD: &str = "api_key_env";

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from the adapter's configuration
    Config,
    /// Loaded from an environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load credential from an environment variable.
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        std::env::var(env_var)
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .map_err(|_| {
                ProviderError::NotConfigured(format!(
                    "{} not set: configure '{}' environment variable",
                    name, env_var
                ))
            })
    }

    /// Load from adapter settings, falling back to the environment.
    ///
    /// Lookup order:
    /// 1. `api_key` in the settings
    /// 2. the variable named by `api_key_env` in the settings
    /// 3. `default_env`
    pub fn from_config_or_env(
        config: &JsonValue,
        default_env: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        if let Some(value) = config[API_KEY_FIELD].as_str() {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }

        let env_var = Self::env_var(config, default_env);
        if let Ok(value) = std::env::var(env_var) {
            return Ok(Self::new(value, CredentialSource::Environment, name));
        }

        Err(ProviderError::NotConfigured(format!(
            "{} required: set '{}' in config or {} environment variable",
            name, API_KEY_FIELD, env_var
        )))
    }

    /// Check if a credential is available without loading it.
    pub fn is_available(config: &JsonValue, default_env: &str) -> bool {
        config[API_KEY_FIELD].as_str().is_some()
            || std::env::var(Self::env_var(config, default_env)).is_ok()
    }

    fn env_var<'a>(config: &'a JsonValue, default_env: &'a str) -> &'a str {
        config[API_KEY_ENV_FIELD].as_str().unwrap_or(default_env)
    }

    /// Expose the credential value. Call only where the value is sent.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}
