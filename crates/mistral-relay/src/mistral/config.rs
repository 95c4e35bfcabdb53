use std::time::Duration;

use crate::errors::RelayError;

/// Public Mistral API origin.
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";

/// Configuration for the Mistral provider client.
#[derive(Clone)]
pub struct MistralClientConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// Base URL for the Mistral-compatible endpoint.
    ///
    /// Useful for proxies or local test servers.
    pub base_url: String,
    /// Default HTTP timeout for requests.
    pub timeout: Duration,
}

impl std::fmt::Debug for MistralClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MistralClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MistralClientConfig {
    /// Creates a config with the public endpoint and a provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Builds a config from `MISTRAL_API_KEY` and optional `MISTRAL_BASE_URL`.
    pub fn from_env() -> Result<Self, RelayError> {
        let api_key = std::env::var("MISTRAL_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(RelayError::configuration(
                "missing MISTRAL_API_KEY for Mistral provider",
            ));
        }
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("MISTRAL_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config = config.base_url(base_url);
        }
        Ok(config)
    }

    /// Overrides the API base URL (for proxies or test servers).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the default HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}
