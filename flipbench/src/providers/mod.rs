//! LLM provider implementations and the registry that builds them

pub mod gemini;
pub mod openai;
pub mod traits;

pub use gemini::GeminiProvider;
pub use openai::OpenAiChatProvider;
pub use traits::{ProviderError, ProviderGateway, ProviderResult, RawResponse};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::config::Config;

/// Everything a backend constructor needs, resolved from configuration
#[derive(Debug, Clone)]
pub struct BackendSpec {
    pub name: String,
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl BackendSpec {
    fn http_client(&self) -> ProviderResult<Client> {
        Ok(Client::builder().timeout(self.timeout).build()?)
    }
}

/// Constructor for one backend kind
pub type ProviderFactory = fn(&BackendSpec) -> ProviderResult<Arc<dyn ProviderGateway>>;

fn build_openai_chat(spec: &BackendSpec) -> ProviderResult<Arc<dyn ProviderGateway>> {
    let client = OpenAiChatProvider::new(&spec.name, spec.api_key.clone(), &spec.base_url)
        .with_http_client(spec.http_client()?)
        .with_model(&spec.default_model)
        .with_temperature(spec.temperature)
        .with_max_tokens(spec.max_tokens);
    Ok(Arc::new(client))
}

fn build_gemini(spec: &BackendSpec) -> ProviderResult<Arc<dyn ProviderGateway>> {
    let client = GeminiProvider::new(&spec.name, spec.api_key.clone(), &spec.base_url)
        .with_http_client(spec.http_client()?)
        .with_model(&spec.default_model)
        .with_temperature(spec.temperature)
        .with_max_tokens(spec.max_tokens);
    Ok(Arc::new(client))
}

/// Maps backend kinds to constructors.
///
/// Provider names live in configuration and each names its kind, so a new
/// backend only needs a `register` call; callers keep going through
/// [`ProviderGateway`].
pub struct ProviderRegistry {
    factories: BTreeMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Registry with no backends
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with the built-in backends
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("openai_chat", build_openai_chat);
        registry.register("gemini", build_gemini);
        registry
    }

    pub fn register(&mut self, kind: impl Into<String>, factory: ProviderFactory) {
        self.factories.insert(kind.into(), factory);
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Resolve a configured provider by name.
    ///
    /// `api_key_env` overrides the environment variable named in the
    /// provider's configuration.
    pub fn resolve(
        &self,
        name: &str,
        config: &Config,
        api_key_env: Option<&str>,
    ) -> ProviderResult<BackendSpec> {
        let pc = config.get_provider(name).ok_or_else(|| {
            ProviderError::Config(format!(
                "Unknown provider: {} (configured: {})",
                name,
                config.enabled_providers().join(", ")
            ))
        })?;

        if !pc.enabled {
            return Err(ProviderError::Config(format!("Provider {} is disabled", name)));
        }

        let env_var = api_key_env.unwrap_or(&pc.api_key_env);
        let api_key = std::env::var(env_var)
            .map_err(|_| ProviderError::Config(format!("{} not set", env_var)))?;

        Ok(BackendSpec {
            name: name.to_string(),
            api_key,
            base_url: pc.base_url.clone(),
            default_model: pc.default_model.clone(),
            temperature: pc.temperature,
            max_tokens: pc.max_tokens,
            timeout: Duration::from_millis(config.run.timeout_ms),
        })
    }

    /// Build a provider from a resolved spec and the configured kind
    pub fn build(&self, kind: &str, spec: &BackendSpec) -> ProviderResult<Arc<dyn ProviderGateway>> {
        let factory = self.factories.get(kind).ok_or_else(|| {
            ProviderError::Config(format!(
                "Unknown provider kind '{}' for {} (registered: {})",
                kind,
                spec.name,
                self.kinds().join(", ")
            ))
        })?;
        factory(spec)
    }

    /// Resolve and build a configured provider in one step
    pub fn create(
        &self,
        name: &str,
        config: &Config,
        api_key_env: Option<&str>,
    ) -> ProviderResult<Arc<dyn ProviderGateway>> {
        let spec = self.resolve(name, config, api_key_env)?;
        let kind = config
            .get_provider(name)
            .map(|pc| pc.kind.as_str())
            .unwrap_or_default();
        let provider = self.build(kind, &spec)?;
        tracing::info!(
            "Using provider {} ({}) at {}",
            provider.name(),
            kind,
            spec.base_url
        );
        Ok(provider)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    fn config_with(name: &str, kind: &str, env: &str) -> Config {
        let mut config = Config::default();
        config.providers.insert(
            name.to_string(),
            ProviderConfig {
                kind: kind.to_string(),
                enabled: true,
                base_url: "http://localhost:9".to_string(),
                api_key_env: env.to_string(),
                default_model: "m".to_string(),
                temperature: 0.1,
                max_tokens: 16,
            },
        );
        config
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let registry = ProviderRegistry::new();
        let err = registry
            .create("no-such-provider", &Config::default(), None)
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::Config(_)));
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let registry = ProviderRegistry::new();
        let config = config_with("local", "openai_chat", "FLIPBENCH_TEST_KEY_THAT_IS_NEVER_SET");
        let err = registry.create("local", &config, None).err().unwrap();
        assert!(err.to_string().contains("FLIPBENCH_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_builds_registered_kinds() {
        std::env::set_var("FLIPBENCH_TEST_KEY_REGISTRY", "k");
        let registry = ProviderRegistry::new();

        let chat = config_with("local", "openai_chat", "FLIPBENCH_TEST_KEY_REGISTRY");
        let provider = registry.create("local", &chat, None).unwrap();
        assert_eq!(provider.name(), "local");
        assert!(provider.supports_streaming());

        let gemini = config_with("g", "gemini", "FLIPBENCH_TEST_KEY_REGISTRY");
        let provider = registry.create("g", &gemini, None).unwrap();
        assert!(!provider.supports_streaming());
    }

    #[test]
    fn test_unknown_kind_is_config_error() {
        std::env::set_var("FLIPBENCH_TEST_KEY_KIND", "k");
        let registry = ProviderRegistry::new();
        let config = config_with("odd", "carrier_pigeon", "FLIPBENCH_TEST_KEY_KIND");
        let err = registry.create("odd", &config, None).err().unwrap();
        assert!(err.to_string().contains("carrier_pigeon"));
    }

    #[test]
    fn test_registering_new_kind() {
        fn build_alias(spec: &BackendSpec) -> ProviderResult<Arc<dyn ProviderGateway>> {
            build_openai_chat(spec)
        }

        std::env::set_var("FLIPBENCH_TEST_KEY_ALIAS", "k");
        let mut registry = ProviderRegistry::empty();
        registry.register("alias", build_alias);
        assert_eq!(registry.kinds(), vec!["alias"]);

        let config = config_with("aliased", "alias", "FLIPBENCH_TEST_KEY_ALIAS");
        assert!(registry.create("aliased", &config, None).is_ok());
    }
}
