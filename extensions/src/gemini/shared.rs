use reqwest::Client;
use secrecy::SecretString;
use tracing::{debug, instrument, trace};
use url::Url;

use super::error::GeminiError;

const DEFAULT_GEMINI_GENERATIVE_LANGUAGE_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Environment variable holding the service credential.
pub const API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";

/// Configuration for the Gemini client.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// Google AI API key. `SecretString` keeps it out of logs.
    pub(crate) api_key: SecretString,
    /// Base URL for the Generative Language API.
    pub(crate) base_url: Url,
    /// Timeout for HTTP requests. Defaults to 60 seconds.
    pub(crate) timeout: std::time::Duration,
}

impl GeminiConfig {
    /// Creates a new Gemini configuration.
    ///
    /// # Errors
    /// Returns `GeminiError::InvalidConfiguration` if the API key is empty.
    /// This is the credential check: it runs before any network activity and
    /// is not retried.
    pub fn new(api_key: impl Into<String>) -> Result<Self, GeminiError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(GeminiError::InvalidConfiguration("API key cannot be empty".to_string()));
        }

        let base_url = Url::parse(DEFAULT_GEMINI_GENERATIVE_LANGUAGE_BASE_URL)
            .map_err(|e| GeminiError::InvalidConfiguration(
                format!("Internal error: Failed to parse default base URL: {}", e)
            ))?; // This should ideally never fail

        Ok(Self {
            api_key: api_key.into(),
            base_url,
            timeout: std::time::Duration::from_secs(60),
        })
    }

    /// Reads the credential from the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, GeminiError> {
        dotenv::dotenv().ok();
        let api_key = std::env::var(API_KEY_ENV_VAR).map_err(|_| {
            GeminiError::InvalidConfiguration(format!("{} is not set", API_KEY_ENV_VAR))
        })?;
        Self::new(api_key)
    }

    /// Allows setting a custom base URL.
    #[must_use]
    pub fn base_url(mut self, url: &str) -> Result<Self, GeminiError> {
        self.base_url = Url::parse(url)
            .map_err(|e| GeminiError::InvalidConfiguration(
                format!("Invalid base URL '{}': {}", url, e)
            ))?;
        Ok(self)
    }

    /// Allows setting a custom request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Shared component holding the HTTP client and configuration for Gemini API
/// access. Carries no per-call mutable state, so it is safe to share across
/// concurrent operations.
#[derive(Clone, Debug)]
pub(crate) struct SharedGeminiClient {
    config: GeminiConfig,
    http_client: Client,
}

impl SharedGeminiClient {
    /// Creates a new SharedGeminiClient.
    /// Builds a default reqwest client if one is not provided.
    #[instrument(name = "shared_gemini_client_new", skip(config, client_override))]
    pub(crate) fn new(config: GeminiConfig, client_override: Option<Client>) -> Result<Self, GeminiError> {
        let client = match client_override {
            Some(client) => {
                debug!("Using provided HTTP client.");
                client
            },
            None => {
                debug!(timeout=?config.timeout, "Building default HTTP client.");
                Client::builder()
                    .timeout(config.timeout)
                    .build()
                    .map_err(|e| GeminiError::InvalidConfiguration(
                        format!("Failed to build default HTTP client: {}", e)
                    ))?
            }
        };

        // Log base URL without API key
        debug!(base_url = %config.base_url, "Shared Gemini client initialized.");

        Ok(Self { config, http_client: client })
    }

    pub(crate) fn http_client(&self) -> &Client {
        &self.http_client
    }

    pub(crate) fn config(&self) -> &GeminiConfig {
        &self.config
    }

    pub(crate) fn build_url(&self, relative_path: &str /* e.g., "models/gemini-pro:generateContent" */ ) -> Result<Url, GeminiError> {
        let base_path = format!("v1beta/{}", relative_path); // Prepend v1beta
        let mut url = self.config.base_url.clone();

        url.path_segments_mut()
            .map_err(|_| GeminiError::InvalidConfiguration("Base URL cannot be a 'cannot-be-a-base' URL.".to_string()))?
            .extend(base_path.split('/')); // Split and extend

        trace!(built_url = %url, "Built Gemini API URL (without auth)");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_rejected_before_any_network_use() {
        let err = GeminiConfig::new("").unwrap_err();
        assert!(matches!(err, GeminiError::InvalidConfiguration(_)));
    }

    #[test]
    fn build_url_targets_v1beta() {
        let config = GeminiConfig::new("test-key").unwrap();
        let shared = SharedGeminiClient::new(config, None).unwrap();
        let url = shared.build_url("models/gemini-3-flash-preview:generateContent").unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-3-flash-preview:generateContent"
        );
    }

    #[test]
    fn custom_base_url_is_honored() {
        let config = GeminiConfig::new("test-key")
            .unwrap()
            .base_url("http://localhost:8080")
            .unwrap();
        let shared = SharedGeminiClient::new(config, None).unwrap();
        let url = shared.build_url("models/m:generateContent").unwrap();
        assert!(url.as_str().starts_with("http://localhost:8080/v1beta/"));
    }
}
