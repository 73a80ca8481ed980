//! Provider registry and model resolution.

use std::sync::Arc;

use tracing::debug;

use super::{
    anthropic, google, openai, AnthropicAdapter, GoogleAdapter, OpenAiAdapter, ProviderAdapter,
};
use crate::core::config::Config;
use crate::core::dispatch::DispatchError;

/// Adapters in resolution priority order.
#[derive(Clone)]
pub struct ProviderRegistry {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    /// Build the OpenAI, Anthropic, Google adapters, honouring any base-URL
    /// overrides and request limits from configuration.
    pub fn from_config(config: &Config) -> Self {
        let base_url = |id: &str, fallback: &str| {
            config
                .base_url_for(id)
                .map(str::to_owned)
                .unwrap_or_else(|| fallback.to_string())
        };

        let mut registry = Self::empty();
        registry.register(Arc::new(OpenAiAdapter::new(
            base_url("openai", openai::DEFAULT_BASE_URL),
            config.max_tokens(),
        )));
        registry.register(Arc::new(AnthropicAdapter::new(
            base_url("anthropic", anthropic::DEFAULT_BASE_URL),
            config.anthropic_version(),
            config.max_tokens(),
        )));
        registry.register(Arc::new(GoogleAdapter::new(base_url(
            "google",
            google::DEFAULT_BASE_URL,
        ))));
        registry
    }

    /// Append an adapter at the lowest priority.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        debug!(provider = adapter.id(), "registered provider adapter");
        self.adapters.push(adapter);
    }

    pub fn adapters(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.adapters
    }

    /// Resolve the adapter that owns `model`.
    pub fn resolve(&self, model: &str) -> Result<Arc<dyn ProviderAdapter>, DispatchError> {
        self.adapters
            .iter()
            .find(|adapter| adapter.owns_model(model))
            .cloned()
            .ok_or_else(|| DispatchError::UnknownModel(model.to_string()))
    }

    /// `(display name, model options)` for every provider, for model pickers.
    pub fn model_groups(&self) -> Vec<(&'static str, &'static [&'static str])> {
        self.adapters
            .iter()
            .map(|adapter| (adapter.display_name(), adapter.model_options()))
            .collect()
    }
}
