//! Common imports for typical relay usage.
pub use crate::{
    AbortHandle, ChatClient, ChatMessage, ChatRequestBuilder, ChatSettings, ChatStream,
    Completion, Conversation, MistralClientConfig, MistralModel, RelayError, Role, StreamOutcome,
};
