use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::abort::AbortHandle;
use crate::client::ChatClient;
use crate::decoder::decode_into;
use crate::errors::{RelayError, StreamFailure};
use crate::model::{CompletionOptions, ProviderRequest, Role, WireMessage};
use crate::provider::CompletionProvider;
use crate::session::StreamSession;
use crate::stream::{BufferUpdate, Completion, StreamOutcome};

/// Default bound of the update channel between the decode task and the
/// consumer.
pub const DEFAULT_STREAM_BUFFER_CAPACITY: usize = 128;

/// Runtime options for a streaming exchange.
#[derive(Clone, Debug)]
pub struct StreamOptions {
    /// Bounded update buffer size.
    pub buffer_capacity: usize,
    /// Caller-owned cancellation handle; a fresh one is created when absent.
    pub abort: Option<AbortHandle>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_STREAM_BUFFER_CAPACITY,
            abort: None,
        }
    }
}

/// Builder for configuring and starting a single chat exchange.
pub struct ChatRequestBuilder {
    client: ChatClient,
    model: String,
    system_prompt: Option<String>,
    messages: Vec<WireMessage>,
    options: CompletionOptions,
    stream_options: StreamOptions,
}

impl ChatRequestBuilder {
    pub(crate) fn new(client: ChatClient, model: String) -> Self {
        Self {
            client,
            model,
            system_prompt: None,
            messages: Vec::new(),
            options: CompletionOptions::default(),
            stream_options: StreamOptions::default(),
        }
    }

    /// Sets a system prompt sent ahead of every other message.
    pub fn system_prompt(mut self, text: impl Into<String>) -> Self {
        self.system_prompt = Some(text.into());
        self
    }

    /// Appends a user message.
    pub fn user_text(mut self, text: impl Into<String>) -> Self {
        self.messages.push(WireMessage::new(Role::User, text));
        self
    }

    /// Appends a prior assistant turn.
    pub fn assistant_text(mut self, text: impl Into<String>) -> Self {
        self.messages.push(WireMessage::new(Role::Assistant, text));
        self
    }

    /// Appends messages in order.
    pub fn messages(mut self, messages: impl IntoIterator<Item = WireMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = Some(max_tokens);
        self
    }

    /// Uses a caller-owned handle to cancel the exchange.
    pub fn abort_handle(mut self, handle: AbortHandle) -> Self {
        self.stream_options.abort = Some(handle);
        self
    }

    /// Sets the bounded update buffer size.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.stream_options.buffer_capacity = capacity;
        self
    }

    /// Validates the builder and starts a streaming exchange.
    pub async fn start_stream(self) -> Result<ChatStream, RelayError> {
        let (client, request, stream_options) = self.build(true)?;
        client.stream_chat(request, stream_options).await
    }

    /// Streams to completion and returns the final text.
    ///
    /// Cancellation is reported as `RelayError::Cancelled` here because the
    /// caller asked for a complete answer.
    pub async fn collect_text(self) -> Result<String, RelayError> {
        let outcome = self
            .start_stream()
            .await?
            .finish()
            .await
            .map_err(|failure| failure.error)?;
        if outcome.is_complete() {
            Ok(outcome.text)
        } else {
            Err(RelayError::Cancelled)
        }
    }

    /// Runs the exchange without streaming and returns the assistant content.
    pub async fn complete(self) -> Result<String, RelayError> {
        let (client, request, stream_options) = self.build(false)?;
        client
            .complete_chat(request, stream_options.abort.as_ref())
            .await
    }

    fn build(self, stream: bool) -> Result<(ChatClient, ProviderRequest, StreamOptions), RelayError> {
        if self.model.trim().is_empty() {
            return Err(RelayError::configuration("model must not be empty"));
        }
        if self.messages.is_empty() {
            return Err(RelayError::configuration(
                "at least one message is required",
            ));
        }
        if self
            .messages
            .iter()
            .any(|message| message.role == Role::User && message.content.trim().is_empty())
        {
            return Err(RelayError::configuration(
                "user message text must not be empty",
            ));
        }

        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        if let Some(system_prompt) = self
            .system_prompt
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            messages.push(WireMessage::new(Role::System, system_prompt));
        }
        messages.extend(self.messages);

        let request = ProviderRequest::new(self.model, messages, &self.options, stream);
        Ok((self.client, request, self.stream_options))
    }
}

/// Handle to a running streaming exchange.
///
/// Use `next_update()` to observe the growing text and `finish()` to obtain
/// the final result. Dropping the handle before `finish()` aborts the
/// exchange and releases the upstream connection.
pub struct ChatStream {
    request_id: uuid::Uuid,
    model: String,
    rx: mpsc::Receiver<BufferUpdate>,
    final_rx: Option<oneshot::Receiver<Result<StreamOutcome, StreamFailure>>>,
    abort_handle: AbortHandle,
    last_text: String,
}

impl ChatStream {
    pub(crate) fn new(
        request_id: uuid::Uuid,
        model: String,
        rx: mpsc::Receiver<BufferUpdate>,
        final_rx: oneshot::Receiver<Result<StreamOutcome, StreamFailure>>,
        abort_handle: AbortHandle,
    ) -> Self {
        Self {
            request_id,
            model,
            rx,
            final_rx: Some(final_rx),
            abort_handle,
            last_text: String::new(),
        }
    }

    pub fn request_id(&self) -> uuid::Uuid {
        self.request_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns a handle that cancels this exchange.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Text carried by the most recent update returned to the caller.
    pub fn last_text(&self) -> &str {
        &self.last_text
    }

    /// Waits for the next cumulative update.
    ///
    /// Returns `None` once the exchange has ended, failed, or been aborted;
    /// no update is returned after `abort()`.
    pub async fn next_update(&mut self) -> Option<BufferUpdate> {
        if self.abort_handle.is_aborted() {
            return None;
        }
        let update = self.rx.recv().await?;
        if self.abort_handle.is_aborted() {
            return None;
        }
        self.last_text.clone_from(&update.text);
        Some(update)
    }

    /// Drains remaining updates and returns the terminal result.
    ///
    /// Safe to call after consuming updates with `next_update()`. A cancelled
    /// outcome carries the text of the last update delivered before the
    /// abort, so it never exceeds what the caller could have shown.
    pub async fn finish(mut self) -> Result<StreamOutcome, StreamFailure> {
        while let Some(update) = self.rx.recv().await {
            if !self.abort_handle.is_aborted() {
                self.last_text = update.text;
            }
        }

        let final_rx = self.final_rx.take();
        let result = match final_rx {
            Some(final_rx) => final_rx.await.ok(),
            None => None,
        };
        let result = result.map(|result| {
            result.map(|mut outcome| {
                if outcome.completion == Completion::Cancelled {
                    outcome.text.clone_from(&self.last_text);
                }
                outcome
            })
        });
        result.unwrap_or_else(|| {
            Err(StreamFailure {
                request_id: self.request_id,
                error: RelayError::protocol(format!(
                    "stream task ended without a result (model={})",
                    self.model
                )),
                partial_text: self.last_text.clone(),
            })
        })
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        if self.final_rx.is_some() {
            self.abort_handle.abort();
        }
    }
}

pub(crate) async fn stream_task(
    provider: Arc<dyn CompletionProvider>,
    request: ProviderRequest,
    mut session: StreamSession,
    tx: mpsc::Sender<BufferUpdate>,
    final_tx: oneshot::Sender<Result<StreamOutcome, StreamFailure>>,
) {
    let request_id = session.request_id();
    let signal = session.signal().clone();

    let result = match provider.open_stream(&request, &signal).await {
        Ok(bytes) => decode_into(&mut session, bytes, &tx).await,
        Err(RelayError::Cancelled) => Ok(Completion::Cancelled),
        Err(err) => Err(err),
    };
    drop(tx);

    let outcome = match result {
        Ok(completion) => {
            debug!(
                request_id = %request_id,
                model = %request.model(),
                ?completion,
                chars = session.accumulated_text().len(),
                malformed_lines = session.malformed_lines(),
                "chat stream ended"
            );
            Ok(StreamOutcome {
                request_id,
                text: session.accumulated_text().to_owned(),
                completion,
                malformed_lines: session.malformed_lines(),
            })
        }
        Err(error) => {
            warn!(request_id = %request_id, model = %request.model(), error = %error, "chat stream failed");
            Err(StreamFailure {
                request_id,
                error,
                partial_text: session.accumulated_text().to_owned(),
            })
        }
    };
    let _ = final_tx.send(outcome);
}
