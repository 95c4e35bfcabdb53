use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mistral_relay::mistral::DEFAULT_BASE_URL;
use mistral_relay::{CompletionProvider, MistralClientConfig, MistralProvider, RelayError};

/// Load `.env` from the crate directory, then from the working directory.
pub fn init() {
    let _ = dotenvy::from_path(Path::new(
        format!("{}/.env", env!("CARGO_MANIFEST_DIR")).as_str(),
    ));
    dotenvy::dotenv().ok();
}

/// Command-line and environment configuration of the relay server.
#[derive(Clone, clap::Parser)]
#[command(name = "mistral-relay-server", version, about = "HTTP relay for Mistral chat completions")]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "RELAY_BIND_ADDR", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Mistral API origin.
    #[arg(long, env = "MISTRAL_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub mistral_base_url: String,

    /// Upstream request timeout in seconds.
    #[arg(long, env = "RELAY_REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    pub request_timeout_secs: u64,

    /// Mistral API key. When absent the chat endpoint answers 500.
    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    pub mistral_api_key: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("mistral_base_url", &self.mistral_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field(
                "mistral_api_key",
                &self.mistral_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl ServerConfig {
    /// Builds the upstream provider, or `None` when no API key is configured.
    pub fn provider(&self) -> Result<Option<Arc<dyn CompletionProvider>>, RelayError> {
        let Some(api_key) = self
            .mistral_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
        else {
            return Ok(None);
        };
        let config = MistralClientConfig::new(api_key)
            .base_url(self.mistral_base_url.clone())
            .timeout(Duration::from_secs(self.request_timeout_secs));
        Ok(Some(Arc::new(MistralProvider::new(config)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;

    #[test]
    fn parses_flags() {
        let config = ServerConfig::try_parse_from([
            "mistral-relay-server",
            "--bind",
            "0.0.0.0:8080",
            "--mistral-base-url",
            "http://localhost:9000",
            "--request-timeout-secs",
            "5",
            "--mistral-api-key",
            "secret",
        ])
        .expect("parse");
        assert_eq!(config.bind, "0.0.0.0:8080".parse().expect("addr"));
        assert_eq!(config.mistral_base_url, "http://localhost:9000");
        assert_eq!(config.request_timeout_secs, 5);
        assert!(config.provider().expect("provider").is_some());
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn blank_api_key_leaves_provider_unset() {
        let config = ServerConfig::try_parse_from([
            "mistral-relay-server",
            "--mistral-api-key",
            "  ",
        ])
        .expect("parse");
        assert!(config.provider().expect("provider").is_none());
    }
}
