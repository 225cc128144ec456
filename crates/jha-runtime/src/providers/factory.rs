//! Adapter factories and the registry that builds adapters from configuration.
//!
//! New back-ends are added by registering a factory; nothing else in the
//! runtime enumerates adapter types.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let adapter = registry.create("openrouter", &json!({"model": "openai/gpt-4o"}))?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{ModelAdapter, ProviderError};

/// Factory for creating model adapters from configuration.
pub trait AdapterFactory: Send + Sync {
    /// Unique identifier used as `type` in adapter configuration.
    fn adapter_type(&self) -> &'static str;

    /// Create an adapter from its settings object.
    fn create(&self, settings: &JsonValue) -> Result<Arc<dyn ModelAdapter>, ProviderError>;

    /// Validate settings without creating an adapter.
    fn validate_config(&self, settings: &JsonValue) -> Result<(), ProviderError>;

    fn description(&self) -> &'static str {
        "Model adapter"
    }
}

/// Registry of available adapter factories, keyed by type.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Arc<dyn AdapterFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any factory of the same type.
    pub fn register(&mut self, factory: Arc<dyn AdapterFactory>) {
        self.factories
            .insert(factory.adapter_type().to_string(), factory);
    }

    pub fn create(
        &self,
        adapter_type: &str,
        settings: &JsonValue,
    ) -> Result<Arc<dyn ModelAdapter>, ProviderError> {
        self.factory(adapter_type)?.create(settings)
    }

    pub fn validate(&self, adapter_type: &str, settings: &JsonValue) -> Result<(), ProviderError> {
        self.factory(adapter_type)?.validate_config(settings)
    }

    fn factory(&self, adapter_type: &str) -> Result<&Arc<dyn AdapterFactory>, ProviderError> {
        self.factories.get(adapter_type).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown adapter type: '{}'. Available: {:?}",
                adapter_type,
                self.available_types()
            ))
        })
    }

    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_type(&self, adapter_type: &str) -> bool {
        self.factories.contains_key(adapter_type)
    }

    /// Registry with the scripted adapter and every adapter compiled in.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::ScriptedAdapterFactory));

        #[cfg(feature = "anthropic")]
        registry.register(Arc::new(super::AnthropicAdapterFactory));
        #[cfg(feature = "openrouter")]
        registry.register(Arc::new(super::OpenRouterAdapterFactory));
        #[cfg(feature = "google")]
        registry.register(Arc::new(super::GeminiAdapterFactory));

        registry
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("adapters", &self.available_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_include_scripted() {
        let registry = ProviderRegistry::with_defaults();
        assert!(registry.has_type("scripted"));
        assert!(!registry.has_type("unknown"));
    }

    #[test]
    fn test_create_scripted_from_settings() {
        let registry = ProviderRegistry::with_defaults();
        let adapter = registry
            .create("scripted", &json!({"provider": "local", "model": "offline"}))
            .unwrap();
        assert_eq!(adapter.model(), "offline");
        assert_eq!(adapter.label(), "local/offline");
    }

    #[test]
    fn test_unknown_type_lists_available() {
        let registry = ProviderRegistry::with_defaults();
        match registry.create("azure", &json!({})) {
            Err(ProviderError::NotConfigured(msg)) => {
                assert!(msg.contains("Unknown adapter type"));
                assert!(msg.contains("scripted"));
            }
            other => panic!("Expected NotConfigured error, got {:?}", other.map(|a| a.label())),
        }
    }

    #[test]
    fn test_validate() {
        let registry = ProviderRegistry::with_defaults();
        assert!(registry.validate("scripted", &json!({})).is_ok());
        assert!(registry.validate("scripted", &json!({"provider": "acme"})).is_err());
        assert!(registry.validate("unknown", &json!({})).is_err());
    }

    #[test]
    fn test_debug_lists_types() {
        let debug = format!("{:?}", ProviderRegistry::with_defaults());
        assert!(debug.contains("scripted"));
    }
}
