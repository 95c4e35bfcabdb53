use tracing::{debug, warn};

use crate::abort::AbortHandle;
use crate::client::ChatClient;
use crate::errors::{RelayError, StreamFailure};
use crate::model::{
    ChatMessage, CompletionOptions, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, MessageStatus,
    MistralModel, ProviderRequest, Role, WireMessage,
};
use crate::run::StreamOptions;
use crate::stream::StreamOutcome;

/// System instruction sent ahead of every conversation turn.
pub const CODE_FORMATTING_PROMPT: &str = "When including code in your responses, always wrap it in triple backticks with the appropriate language identifier. For example: ```python\nprint(\"Hello World\")\n``` or ```javascript\nconsole.log(\"Hello World\");\n```";

/// User-adjustable settings applied to every send.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSettings {
    pub model: MistralModel,
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream_response: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: MistralModel::default(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            stream_response: true,
        }
    }
}

impl ChatSettings {
    fn completion_options(&self) -> CompletionOptions {
        CompletionOptions::default()
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
    }
}

/// A send accepted by [`Conversation::begin_send`] that still has to be
/// carried out against a provider.
#[derive(Clone, Debug)]
pub struct PendingSend {
    pub request: ProviderRequest,
    /// Id of the assistant message the reply is written to.
    pub assistant_id: String,
    pub abort: AbortHandle,
}

#[derive(Debug)]
struct InFlight {
    abort: AbortHandle,
    assistant_id: String,
}

/// Settles the conversation if a `send` future is dropped mid-exchange.
struct SendGuard<'a>(&'a mut Conversation);

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.0.abandon_send();
    }
}

/// Message list of a single chat plus the state of the exchange in flight.
///
/// `send` drives a whole exchange. The `begin_send` / `apply_update` /
/// `finish_*` steps are exposed for callers that run the exchange
/// themselves.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    settings: ChatSettings,
    last_error: Option<RelayError>,
    in_flight: Option<InFlight>,
}

impl Conversation {
    pub fn new(settings: ChatSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Starts from an existing message history.
    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ChatSettings {
        &mut self.settings
    }

    /// Error of the most recent failed exchange, cleared by the next send.
    pub fn last_error(&self) -> Option<&RelayError> {
        self.last_error.as_ref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Cancels the exchange in flight, if any.
    pub fn abort(&self) {
        if let Some(in_flight) = &self.in_flight {
            in_flight.abort.abort();
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Sends `input` and waits for the reply.
    ///
    /// Whitespace-only input is ignored. Exchange failures are recorded in
    /// `last_error` and also returned; cancellation is not an error.
    pub async fn send(&mut self, client: &ChatClient, input: &str) -> Result<(), RelayError> {
        self.send_with(client, input, AbortHandle::new()).await
    }

    /// Like [`send`](Self::send), cancellable through `abort`.
    ///
    /// Dropping the returned future aborts the exchange and settles the reply
    /// as if it had been cancelled.
    pub async fn send_with(
        &mut self,
        client: &ChatClient,
        input: &str,
        abort: AbortHandle,
    ) -> Result<(), RelayError> {
        let Some(pending) = self.begin_send(input, abort)? else {
            return Ok(());
        };
        let mut guard = SendGuard(self);
        guard.0.run_send(client, pending).await
    }

    async fn run_send(&mut self, client: &ChatClient, pending: PendingSend) -> Result<(), RelayError> {
        if !pending.request.is_stream() {
            let result = client
                .complete_chat(pending.request, Some(&pending.abort))
                .await;
            return self.finish_complete(&pending.assistant_id, result);
        }

        let options = StreamOptions {
            abort: Some(pending.abort.clone()),
            ..StreamOptions::default()
        };
        let mut stream = match client.stream_chat(pending.request, options).await {
            Ok(stream) => stream,
            Err(error) => {
                let failure = StreamFailure {
                    request_id: uuid::Uuid::nil(),
                    error,
                    partial_text: String::new(),
                };
                return self.finish_streaming(&pending.assistant_id, Err(failure));
            }
        };
        while let Some(update) = stream.next_update().await {
            self.apply_update(&pending.assistant_id, update.text);
        }
        let result = stream.finish().await;
        self.finish_streaming(&pending.assistant_id, result)
    }

    /// Records the user turn and builds the provider request.
    ///
    /// Returns `Ok(None)` for whitespace-only input. When streaming is on, an
    /// empty assistant placeholder with status `Streaming` is appended.
    pub fn begin_send(
        &mut self,
        input: &str,
        abort: AbortHandle,
    ) -> Result<Option<PendingSend>, RelayError> {
        if self.in_flight.is_some() {
            return Err(RelayError::configuration(
                "a message is already being sent",
            ));
        }
        if input.trim().is_empty() {
            return Ok(None);
        }

        self.last_error = None;
        self.messages.push(ChatMessage::user(input));

        let mut wire = Vec::with_capacity(self.messages.len() + 1);
        wire.push(WireMessage::new(Role::System, CODE_FORMATTING_PROMPT));
        wire.extend(self.messages.iter().map(WireMessage::from));

        let stream = self.settings.stream_response;
        let request = ProviderRequest::new(
            self.settings.model.wire_name(),
            wire,
            &self.settings.completion_options(),
            stream,
        );

        let assistant_id = uuid::Uuid::new_v4().to_string();
        if stream {
            self.messages.push(
                ChatMessage::assistant("")
                    .with_id(assistant_id.clone())
                    .with_status(MessageStatus::Streaming),
            );
        }
        self.in_flight = Some(InFlight {
            abort: abort.clone(),
            assistant_id: assistant_id.clone(),
        });
        debug!(model = %request.model(), messages = request.messages().len(), stream, "conversation send started");

        Ok(Some(PendingSend {
            request,
            assistant_id,
            abort,
        }))
    }

    /// Replaces the streaming placeholder's content with a cumulative
    /// snapshot.
    pub fn apply_update(&mut self, assistant_id: &str, text: String) {
        if let Some(message) = self.streaming_message(assistant_id) {
            message.content = text;
        }
    }

    /// Settles the streaming placeholder once the stream has ended.
    pub fn finish_streaming(
        &mut self,
        assistant_id: &str,
        result: Result<StreamOutcome, StreamFailure>,
    ) -> Result<(), RelayError> {
        self.in_flight = None;
        match result {
            Ok(outcome) if outcome.is_complete() => {
                if let Some(message) = self.streaming_message(assistant_id) {
                    message.content = outcome.text;
                    message.status = MessageStatus::Complete;
                }
                Ok(())
            }
            Ok(outcome) => {
                self.settle_incomplete(assistant_id, outcome.text);
                Ok(())
            }
            Err(failure) if failure.error.is_cancelled() => {
                self.settle_incomplete(assistant_id, failure.partial_text);
                Ok(())
            }
            Err(failure) => {
                warn!(error = %failure.error, partial_chars = failure.partial_text.len(), "conversation send failed");
                self.settle_incomplete(assistant_id, failure.partial_text);
                self.last_error = Some(failure.error.clone());
                Err(failure.error)
            }
        }
    }

    /// Appends the assistant reply of a non-streaming exchange.
    pub fn finish_complete(
        &mut self,
        assistant_id: &str,
        result: Result<String, RelayError>,
    ) -> Result<(), RelayError> {
        self.in_flight = None;
        match result {
            Ok(content) => {
                self.messages
                    .push(ChatMessage::assistant(content).with_id(assistant_id));
                Ok(())
            }
            Err(RelayError::Cancelled) => Ok(()),
            Err(error) => {
                warn!(error = %error, "conversation send failed");
                self.last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Gives up on the send in flight: aborts it and settles its reply with
    /// whatever text was applied so far. No-op when nothing is in flight.
    pub fn abandon_send(&mut self) {
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };
        in_flight.abort.abort();
        let text = self
            .streaming_message(&in_flight.assistant_id)
            .map(|message| message.content.clone())
            .unwrap_or_default();
        debug!(partial_chars = text.len(), "conversation send abandoned");
        self.settle_incomplete(&in_flight.assistant_id, text);
    }

    fn streaming_message(&mut self, assistant_id: &str) -> Option<&mut ChatMessage> {
        self.messages
            .iter_mut()
            .find(|m| m.id == assistant_id && m.status == MessageStatus::Streaming)
    }

    /// Keeps partial text as `Incomplete`, or drops the placeholder when
    /// nothing arrived.
    fn settle_incomplete(&mut self, assistant_id: &str, text: String) {
        if text.is_empty() {
            self.messages
                .retain(|m| !(m.id == assistant_id && m.status == MessageStatus::Streaming));
        } else if let Some(message) = self.streaming_message(assistant_id) {
            message.content = text;
            message.status = MessageStatus::Incomplete;
        }
    }
}
