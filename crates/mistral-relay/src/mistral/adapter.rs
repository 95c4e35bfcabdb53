use futures::StreamExt as _;
use tracing::debug;

use crate::abort::AbortSignal;
use crate::errors::RelayError;
use crate::model::ProviderRequest;
use crate::provider::{ByteStream, CompletionProvider};

use super::config::MistralClientConfig;

/// Provider adapter for Mistral's chat-completions API.
pub struct MistralProvider {
    client: reqwest::Client,
    config: MistralClientConfig,
}

impl MistralProvider {
    /// Creates a provider from explicit client configuration.
    pub fn new(config: MistralClientConfig) -> Result<Self, RelayError> {
        if config.api_key.trim().is_empty() {
            return Err(RelayError::configuration(
                "Mistral client config api_key must not be empty",
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                RelayError::configuration(format!("failed to build Mistral client: {e}"))
            })?;
        Ok(Self { client, config })
    }

    /// Creates a provider using `MISTRAL_API_KEY`.
    pub fn from_env() -> Result<Self, RelayError> {
        Self::new(MistralClientConfig::from_env()?)
    }

    /// Sends `request` and waits for response headers.
    ///
    /// Nothing is sent when the request is invalid or the signal has already
    /// fired. Non-success statuses become `Upstream` errors.
    async fn send(
        &self,
        request: &ProviderRequest,
        signal: &AbortSignal,
    ) -> Result<reqwest::Response, RelayError> {
        request.validate()?;
        if signal.is_aborted() {
            return Err(RelayError::Cancelled);
        }
        debug!(model = %request.model(), messages = request.messages().len(), stream = request.is_stream(), "sending Mistral chat completion");

        let pending = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send();
        let response = tokio::select! {
            biased;
            _ = signal.aborted() => return Err(RelayError::Cancelled),
            response = pending => response.map_err(|e| {
                RelayError::transport(format!("Mistral request failed: {e}"))
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            let fallback = status
                .canonical_reason()
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| status.as_str().to_owned());
            let body = response.bytes().await.unwrap_or_default();
            let message = extract_error_message(&body).unwrap_or(fallback);
            debug!(status = status.as_u16(), message = %message, "Mistral returned an error status");
            return Err(RelayError::upstream(status.as_u16(), message));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl CompletionProvider for MistralProvider {
    async fn open_stream(
        &self,
        request: &ProviderRequest,
        signal: &AbortSignal,
    ) -> Result<ByteStream, RelayError> {
        if !request.is_stream() {
            return Err(RelayError::configuration(
                "streaming call requires stream = true",
            ));
        }
        let response = self.send(request, signal).await?;
        let bytes = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| RelayError::transport(format!("Mistral streaming read failed: {e}")))
        });
        Ok(Box::pin(bytes))
    }

    async fn complete_raw(
        &self,
        request: &ProviderRequest,
        signal: &AbortSignal,
    ) -> Result<serde_json::Value, RelayError> {
        if request.is_stream() {
            return Err(RelayError::configuration(
                "non-streaming call requires stream = false",
            ));
        }
        let response = self.send(request, signal).await?;
        let body = tokio::select! {
            biased;
            _ = signal.aborted() => return Err(RelayError::Cancelled),
            body = response.bytes() => body.map_err(|e| {
                RelayError::transport(format!("Mistral response read failed: {e}"))
            })?,
        };
        serde_json::from_slice(&body)
            .map_err(|e| RelayError::protocol(format!("Mistral response is not JSON: {e}")))
    }
}

/// Pulls the human-readable message out of a provider error body.
///
/// Accepts `{"error": {"message": ...}}`, `{"error": "..."}` and the flat
/// `{"message": ...}` shape Mistral uses for auth failures.
pub(crate) fn extract_error_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let error = value.get("error");
    error
        .and_then(|e| e.get("message"))
        .and_then(|v| v.as_str())
        .or_else(|| error.and_then(|e| e.as_str()))
        .or_else(|| value.get("message").and_then(|v| v.as_str()))
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abort::AbortHandle;
    use crate::model::{CompletionOptions, Role, WireMessage};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> MistralProvider {
        MistralProvider::new(MistralClientConfig::new("test-key").base_url(server.uri()))
            .expect("provider")
    }

    fn streaming_request() -> ProviderRequest {
        ProviderRequest::streaming(
            "mistral-small-latest",
            vec![WireMessage::new(Role::User, "hello")],
            &CompletionOptions::default(),
        )
    }

    async fn read_all(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.expect("chunk"));
        }
        out
    }

    #[test]
    fn empty_api_key_is_rejected_at_construction() {
        let err = MistralProvider::new(MistralClientConfig::new("  ")).err();
        assert!(matches!(err, Some(RelayError::Configuration(msg)) if msg.contains("api_key")));
    }

    #[test]
    fn error_message_extraction_covers_known_shapes() {
        assert_eq!(
            extract_error_message(br#"{"error":{"message":"Invalid model"}}"#).as_deref(),
            Some("Invalid model")
        );
        assert_eq!(
            extract_error_message(br#"{"error":"bad request"}"#).as_deref(),
            Some("bad request")
        );
        assert_eq!(
            extract_error_message(br#"{"message":"Unauthorized","request_id":"r"}"#).as_deref(),
            Some("Unauthorized")
        );
        assert_eq!(extract_error_message(br#"{"error":{}}"#), None);
        assert_eq!(extract_error_message(b"<html>502</html>"), None);
    }

    #[tokio::test]
    async fn stream_request_posts_wire_body_with_bearer_auth() {
        let server = MockServer::start().await;
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n";
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_json(serde_json::json!({
                "model": "mistral-small-latest",
                "messages": [{"role": "user", "content": "hello"}],
                "temperature": 0.7,
                "max_tokens": 1000,
                "stream": true,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let stream = provider_for(&server)
            .open_stream(&streaming_request(), &AbortSignal::never())
            .await
            .expect("open stream");
        assert_eq!(read_all(stream).await, sse.as_bytes());
    }

    #[tokio::test]
    async fn unauthorized_surfaces_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"error": {"message": "Invalid API key"}})),
            )
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .open_stream(&streaming_request(), &AbortSignal::never())
            .await
            .err()
            .expect("401 should fail");
        assert_eq!(err, RelayError::upstream(401, "Invalid API key"));
    }

    #[tokio::test]
    async fn unparseable_error_body_falls_back_to_status_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .open_stream(&streaming_request(), &AbortSignal::never())
            .await
            .err()
            .expect("401 should fail");
        assert_eq!(err, RelayError::upstream(401, "Unauthorized"));
    }

    #[tokio::test]
    async fn cancelled_signal_skips_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let handle = AbortHandle::new();
        handle.abort();
        let err = provider_for(&server)
            .open_stream(&streaming_request(), &handle.signal())
            .await
            .err()
            .expect("cancelled");
        assert_eq!(err, RelayError::Cancelled);
    }

    #[tokio::test]
    async fn empty_messages_fail_before_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let request =
            ProviderRequest::streaming("mistral-small-latest", vec![], &CompletionOptions::default());
        let err = provider_for(&server)
            .open_stream(&request, &AbortSignal::never())
            .await
            .err()
            .expect("empty messages");
        assert!(matches!(err, RelayError::Configuration(_)));
    }

    #[tokio::test]
    async fn abort_while_waiting_for_headers_cancels() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(30)))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let handle = AbortHandle::new();
        let signal = handle.signal();
        let request = streaming_request();
        let call = provider.open_stream(&request, &signal);
        let abort_later = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            handle.abort();
        };
        let (result, ()) = tokio::join!(call, abort_later);
        assert_eq!(result.err(), Some(RelayError::Cancelled));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_transport_error() {
        let provider = MistralProvider::new(
            MistralClientConfig::new("test-key").base_url("http://127.0.0.1:1"),
        )
        .expect("provider");
        let err = provider
            .open_stream(&streaming_request(), &AbortSignal::never())
            .await
            .err()
            .expect("connection refused");
        assert!(matches!(err, RelayError::Transport(_)));
    }

    #[tokio::test]
    async fn complete_raw_returns_provider_body() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "id": "cmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Full answer"}, "finish_reason": "stop"}]
        });
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(wiremock::matchers::body_partial_json(serde_json::json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let request = ProviderRequest::blocking(
            "mistral-small-latest",
            vec![WireMessage::new(Role::User, "hello")],
            &CompletionOptions::default(),
        );
        let value = provider_for(&server)
            .complete_raw(&request, &AbortSignal::never())
            .await
            .expect("complete");
        assert_eq!(value, body);
    }

    #[tokio::test]
    async fn stream_flag_mismatch_is_configuration_error() {
        let server = MockServer::start().await;
        let provider = provider_for(&server);
        let blocking = ProviderRequest::blocking(
            "m",
            vec![WireMessage::new(Role::User, "x")],
            &CompletionOptions::default(),
        );
        assert!(matches!(
            provider.open_stream(&blocking, &AbortSignal::never()).await.err(),
            Some(RelayError::Configuration(_))
        ));
        assert!(matches!(
            provider
                .complete_raw(&streaming_request(), &AbortSignal::never())
                .await
                .err(),
            Some(RelayError::Configuration(_))
        ));
    }
}
