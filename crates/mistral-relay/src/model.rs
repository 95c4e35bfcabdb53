use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::errors::RelayError;

/// Wire name of the model used when a caller does not pick one.
pub const DEFAULT_MODEL: &str = "mistral-small-latest";
/// Sampling temperature used when a caller does not pick one.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
/// Completion length cap used when a caller does not pick one.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Author of a chat message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a message's content is final.
///
/// Only assistant messages ever leave `Complete`: a streaming reply is
/// `Streaming` while it grows and `Incomplete` if the exchange was cancelled
/// or failed after some text arrived.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Complete,
    Streaming,
    Incomplete,
}

/// A message in a conversation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: MessageStatus,
}

impl ChatMessage {
    /// Creates a complete message with a fresh id.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            status: MessageStatus::Complete,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Replaces the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub(crate) fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }
}

/// `{role, content}` pair as sent to the provider.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        Self::new(message.role, message.content.clone())
    }
}

/// Mistral model families selectable from the chat settings.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum MistralModel {
    #[serde(rename = "mistral-tiny")]
    Tiny,
    #[default]
    #[serde(rename = "mistral-small")]
    Small,
    #[serde(rename = "mistral-medium")]
    Medium,
    #[serde(rename = "mistral-large")]
    Large,
}

impl MistralModel {
    /// Model name accepted by the completions endpoint (`mistral-<size>-latest`).
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Tiny => "mistral-tiny-latest",
            Self::Small => "mistral-small-latest",
            Self::Medium => "mistral-medium-latest",
            Self::Large => "mistral-large-latest",
        }
    }
}

impl fmt::Display for MistralModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for MistralModel {
    type Err = RelayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let name = value.trim().to_ascii_lowercase();
        let name = name.strip_suffix("-latest").unwrap_or(&name);
        let name = name.strip_prefix("mistral-").unwrap_or(name);
        match name {
            "tiny" => Ok(Self::Tiny),
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            _ => Err(RelayError::configuration(format!(
                "unknown Mistral model: {value}"
            ))),
        }
    }
}

impl From<MistralModel> for String {
    fn from(value: MistralModel) -> Self {
        value.wire_name().to_string()
    }
}

/// Sampling options carried into a `ProviderRequest`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompletionOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
        }
    }
}

impl CompletionOptions {
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Chat-completions request body.
///
/// Built fresh for every call and read-only afterwards; serializes to the
/// exact upstream wire shape.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ProviderRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

impl ProviderRequest {
    pub fn new(
        model: impl Into<String>,
        messages: Vec<WireMessage>,
        options: &CompletionOptions,
        stream: bool,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream,
        }
    }

    /// Builds a request with `stream = true`.
    pub fn streaming(
        model: impl Into<String>,
        messages: Vec<WireMessage>,
        options: &CompletionOptions,
    ) -> Self {
        Self::new(model, messages, options, true)
    }

    /// Builds a request with `stream = false`.
    pub fn blocking(
        model: impl Into<String>,
        messages: Vec<WireMessage>,
        options: &CompletionOptions,
    ) -> Self {
        Self::new(model, messages, options, false)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn messages(&self) -> &[WireMessage] {
        &self.messages
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }

    /// True when the provider is asked for an SSE body.
    pub fn is_stream(&self) -> bool {
        self.stream
    }

    /// Checks the caller-side constraints enforced before any network call.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.model.trim().is_empty() {
            return Err(RelayError::configuration("model must not be empty"));
        }
        if self.messages.is_empty() {
            return Err(RelayError::configuration(
                "at least one message is required",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_map_to_latest_aliases() {
        assert_eq!(MistralModel::Tiny.wire_name(), "mistral-tiny-latest");
        assert_eq!(MistralModel::default().wire_name(), DEFAULT_MODEL);
        assert_eq!(
            "mistral-large".parse::<MistralModel>().expect("parse"),
            MistralModel::Large
        );
        assert_eq!(
            "mistral-medium-latest".parse::<MistralModel>().expect("parse"),
            MistralModel::Medium
        );
        assert!("codestral".parse::<MistralModel>().is_err());
    }

    #[test]
    fn request_serializes_to_wire_shape() {
        let request = ProviderRequest::streaming(
            MistralModel::Small,
            vec![WireMessage::new(Role::User, "hello")],
            &CompletionOptions::default(),
        );
        let body = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            body,
            serde_json::json!({
                "model": "mistral-small-latest",
                "messages": [{"role": "user", "content": "hello"}],
                "temperature": 0.7,
                "max_tokens": 1000,
                "stream": true,
            })
        );
    }

    #[test]
    fn request_exposes_fields_read_only() {
        let request = ProviderRequest::blocking(
            MistralModel::Large,
            vec![WireMessage::new(Role::User, "hello")],
            &CompletionOptions::default().temperature(0.1).max_tokens(8),
        );
        assert_eq!(request.model(), "mistral-large-latest");
        assert_eq!(request.messages(), &[WireMessage::new(Role::User, "hello")]);
        assert_eq!(request.temperature(), Some(0.1));
        assert_eq!(request.max_tokens(), Some(8));
        assert!(!request.is_stream());
    }

    #[test]
    fn unset_options_are_omitted_from_wire_body() {
        let options = CompletionOptions {
            temperature: None,
            max_tokens: None,
        };
        let request =
            ProviderRequest::blocking("m", vec![WireMessage::new(Role::System, "s")], &options);
        let body = serde_json::to_value(&request).expect("serialize");
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body.get("stream").and_then(|v| v.as_bool()), Some(false));
    }

    #[test]
    fn validate_rejects_empty_messages_and_model() {
        let options = CompletionOptions::default();
        let err = ProviderRequest::streaming("m", vec![], &options)
            .validate()
            .expect_err("empty messages");
        assert!(matches!(err, RelayError::Configuration(msg) if msg.contains("message")));

        let err = ProviderRequest::streaming(" ", vec![WireMessage::new(Role::User, "x")], &options)
            .validate()
            .expect_err("empty model");
        assert!(matches!(err, RelayError::Configuration(msg) if msg.contains("model")));
    }

    #[test]
    fn chat_message_serializes_camel_case_with_status() {
        let message = ChatMessage::assistant("hi").with_id("a-1");
        let value = serde_json::to_value(&message).expect("serialize");
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some("a-1"));
        assert_eq!(value.get("role").and_then(|v| v.as_str()), Some("assistant"));
        assert!(value.get("createdAt").is_some());
        assert_eq!(value.get("status").and_then(|v| v.as_str()), Some("complete"));
        assert_eq!(WireMessage::from(&message), WireMessage::new(Role::Assistant, "hi"));
    }
}
