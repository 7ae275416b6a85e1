//! Provider registry built from environment configuration

use super::{rasa, ChatProvider, GeminiProvider, LoggingProvider, RasaProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for chat providers
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    /// Rasa webhook URL; `None` disables the provider
    pub rasa_url: Option<String>,
    /// Default provider ID
    pub default_provider: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            rasa_url: None,
            default_provider: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ProviderConfig {
    /// Read configuration from the environment.
    ///
    /// A missing API key does not fail startup; it only leaves the provider
    /// out of the registry, and calls against it fail later.
    pub fn from_env() -> Self {
        let rasa_url = std::env::var("RASA_WEBHOOK_URL").ok().or_else(|| {
            std::env::var("RASA_ENABLED")
                .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .then(|| rasa::DEFAULT_WEBHOOK_URL.to_string())
        });

        let request_timeout = std::env::var("INTAKE_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs);

        Self {
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok(),
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            rasa_url,
            default_provider: std::env::var("DEFAULT_PROVIDER").ok(),
            request_timeout,
        }
    }
}

/// Registry of available chat providers
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ChatProvider>>,
    default_provider: String,
}

impl ProviderRegistry {
    pub fn new(config: &ProviderConfig) -> Self {
        let mut providers: HashMap<String, Arc<dyn ChatProvider>> = HashMap::new();

        if let Some(key) = config
            .gemini_api_key
            .as_ref()
            .filter(|key| !key.is_empty())
        {
            match GeminiProvider::new(key.clone(), &config.gemini_model, config.request_timeout) {
                Ok(provider) => {
                    providers.insert(
                        "gemini".to_string(),
                        Arc::new(LoggingProvider::new(Arc::new(provider))),
                    );
                }
                Err(e) => tracing::warn!(error = %e, "Failed to create Gemini provider"),
            }
        }

        if let Some(url) = config.rasa_url.as_ref().filter(|url| !url.is_empty()) {
            match RasaProvider::new(url.clone(), config.request_timeout) {
                Ok(provider) => {
                    providers.insert(
                        "rasa".to_string(),
                        Arc::new(LoggingProvider::new(Arc::new(provider))),
                    );
                }
                Err(e) => tracing::warn!(error = %e, "Failed to create Rasa provider"),
            }
        }

        let default_provider = config
            .default_provider
            .clone()
            .or_else(|| {
                if providers.contains_key("gemini") {
                    Some("gemini".to_string())
                } else {
                    providers.keys().next().cloned()
                }
            })
            .unwrap_or_else(|| "gemini".to_string());

        Self {
            providers,
            default_provider,
        }
    }

    /// Registry holding a single caller-supplied provider
    #[cfg(test)]
    pub fn with_provider(id: &str, provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            providers: HashMap::from([(id.to_string(), provider)]),
            default_provider: id.to_string(),
        }
    }

    /// Get a provider by ID
    pub fn get(&self, id: &str) -> Option<Arc<dyn ChatProvider>> {
        self.providers.get(id).cloned()
    }

    /// Get the default provider ID
    pub fn default_provider_id(&self) -> &str {
        &self.default_provider
    }

    /// List all available provider IDs
    pub fn available_providers(&self) -> Vec<String> {
        let mut providers: Vec<_> = self.providers.keys().cloned().collect();
        providers.sort();
        providers
    }

    /// Check if any providers are available
    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_config_no_providers() {
        let registry = ProviderRegistry::new(&ProviderConfig::default());
        assert!(registry.available_providers().is_empty());
        assert!(!registry.has_providers());
    }

    #[test]
    fn gemini_key_only_gemini() {
        let config = ProviderConfig {
            gemini_api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        let registry = ProviderRegistry::new(&config);
        assert_eq!(registry.available_providers(), vec!["gemini"]);
        assert_eq!(registry.default_provider_id(), "gemini");
    }

    #[test]
    fn empty_key_is_ignored() {
        let config = ProviderConfig {
            gemini_api_key: Some(String::new()),
            ..Default::default()
        };
        let registry = ProviderRegistry::new(&config);
        assert!(!registry.has_providers());
    }

    #[test]
    fn rasa_url_enables_webhook_provider() {
        let config = ProviderConfig {
            rasa_url: Some(rasa::DEFAULT_WEBHOOK_URL.to_string()),
            ..Default::default()
        };
        let registry = ProviderRegistry::new(&config);
        assert_eq!(registry.available_providers(), vec!["rasa"]);
        // With no Gemini configured, the only provider becomes the default
        assert_eq!(registry.default_provider_id(), "rasa");
    }

    #[test]
    fn gemini_is_preferred_default() {
        let config = ProviderConfig {
            gemini_api_key: Some("test-key".to_string()),
            rasa_url: Some(rasa::DEFAULT_WEBHOOK_URL.to_string()),
            ..Default::default()
        };
        let registry = ProviderRegistry::new(&config);
        assert_eq!(registry.available_providers(), vec!["gemini", "rasa"]);
        assert_eq!(registry.default_provider_id(), "gemini");
    }

    #[test]
    fn custom_default_provider() {
        let config = ProviderConfig {
            gemini_api_key: Some("test-key".to_string()),
            rasa_url: Some(rasa::DEFAULT_WEBHOOK_URL.to_string()),
            default_provider: Some("rasa".to_string()),
            ..Default::default()
        };
        let registry = ProviderRegistry::new(&config);
        assert_eq!(registry.default_provider_id(), "rasa");
    }
}
