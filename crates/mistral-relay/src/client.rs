use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::abort::{AbortHandle, AbortSignal};
use crate::completion::{assistant_content, usage};
use crate::errors::RelayError;
use crate::mistral::{MistralClientConfig, MistralProvider};
use crate::model::ProviderRequest;
use crate::provider::CompletionProvider;
use crate::run::{ChatRequestBuilder, ChatStream, StreamOptions, stream_task};
use crate::session::StreamSession;

/// Entry point for streaming and non-streaming chat exchanges.
///
/// Cheap to clone; every clone shares the same provider.
#[derive(Clone)]
pub struct ChatClient {
    provider: Arc<dyn CompletionProvider>,
}

impl ChatClient {
    /// Wraps an explicitly constructed provider.
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Creates a client backed by `MistralProvider`.
    pub fn mistral(config: MistralClientConfig) -> Result<Self, RelayError> {
        Ok(Self::new(Arc::new(MistralProvider::new(config)?)))
    }

    /// Creates a Mistral-backed client from `MISTRAL_API_KEY`.
    pub fn from_env() -> Result<Self, RelayError> {
        Self::mistral(MistralClientConfig::from_env()?)
    }

    /// Returns the provider this client sends through.
    pub fn provider(&self) -> Arc<dyn CompletionProvider> {
        self.provider.clone()
    }

    /// Starts building a request for `model`.
    pub fn chat(&self, model: impl Into<String>) -> ChatRequestBuilder {
        ChatRequestBuilder::new(self.clone(), model.into())
    }

    /// Starts a streaming exchange for a prebuilt request.
    ///
    /// Fails before any network call when the request is invalid, does not
    /// set `stream`, or the abort handle in `options` has already fired.
    pub async fn stream_chat(
        &self,
        request: ProviderRequest,
        options: StreamOptions,
    ) -> Result<ChatStream, RelayError> {
        request.validate()?;
        if !request.is_stream() {
            return Err(RelayError::configuration(
                "streaming call requires stream = true",
            ));
        }
        if options.buffer_capacity == 0 {
            return Err(RelayError::configuration(
                "stream buffer capacity must be greater than 0",
            ));
        }
        let abort_handle = options.abort.unwrap_or_default();
        if abort_handle.is_aborted() {
            return Err(RelayError::Cancelled);
        }

        let request_id = uuid::Uuid::new_v4();
        let (tx, rx) = mpsc::channel(options.buffer_capacity);
        let (final_tx, final_rx) = oneshot::channel();
        let session = StreamSession::new(request_id, abort_handle.signal());
        let model = request.model().to_owned();
        debug!(request_id = %request_id, model = %model, "starting chat stream");

        tokio::spawn(stream_task(
            self.provider.clone(),
            request,
            session,
            tx,
            final_tx,
        ));

        Ok(ChatStream::new(request_id, model, rx, final_rx, abort_handle))
    }

    /// Runs a non-streaming exchange and returns the assistant content.
    pub async fn complete_chat(
        &self,
        request: ProviderRequest,
        abort: Option<&AbortHandle>,
    ) -> Result<String, RelayError> {
        if request.is_stream() {
            return Err(RelayError::configuration(
                "non-streaming call requires stream = false",
            ));
        }
        let signal = abort.map_or_else(AbortSignal::never, AbortHandle::signal);
        let body = self.provider.complete_raw(&request, &signal).await?;
        if let Some(usage) = usage(&body) {
            debug!(
                model = %request.model(),
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "chat completion usage"
            );
        }
        assistant_content(&body)
    }
}
