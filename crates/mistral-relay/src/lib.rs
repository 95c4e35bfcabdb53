//! Streaming chat-completion relay for Mistral.
//!
//! The provider is constructed explicitly with its credential and shared
//! through a [`ChatClient`]. Streaming replies are decoded from the SSE body
//! into cumulative text snapshots and can be cancelled at any point through
//! an [`AbortHandle`].
//!
//! ```no_run
//! use mistral_relay::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), RelayError> {
//! let client = ChatClient::from_env()?;
//! let mut stream = client
//!     .chat(MistralModel::Small)
//!     .user_text("Say hello")
//!     .start_stream()
//!     .await?;
//!
//! while let Some(update) = stream.next_update().await {
//!     println!("{}", update.text);
//! }
//! let outcome = stream.finish().await.map_err(|failure| failure.error)?;
//! assert!(outcome.is_complete());
//! # Ok(())
//! # }
//! ```

/// Cancellation handle and signal.
pub mod abort;
/// Client entry point.
pub mod client;
/// Non-streaming response helpers.
pub mod completion;
/// Message list and settings of a chat.
pub mod conversation;
/// Async decode loop tying the byte stream to a session.
pub mod decoder;
/// Public error types.
pub mod errors;
/// Mistral HTTP integration.
pub mod mistral;
/// Messages, models, and request types.
pub mod model;
/// Common imports for typical usage.
pub mod prelude;
/// Provider contract.
pub mod provider;
/// Request builder and streaming handle.
pub mod run;
/// Per-exchange decode state.
pub mod session;
/// SSE line framing and parsing.
pub mod sse;
/// Stream notifications and outcomes.
pub mod stream;

pub use abort::{AbortHandle, AbortSignal};
pub use client::ChatClient;
pub use completion::{Usage, assistant_content};
pub use conversation::{CODE_FORMATTING_PROMPT, ChatSettings, Conversation, PendingSend};
pub use errors::{DecodeError, RelayError, StreamFailure};
pub use mistral::{MistralClientConfig, MistralProvider};
pub use model::{
    ChatMessage, CompletionOptions, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
    MessageStatus, MistralModel, ProviderRequest, Role, WireMessage,
};
pub use provider::{ByteStream, CompletionProvider};
pub use run::{ChatRequestBuilder, ChatStream, DEFAULT_STREAM_BUFFER_CAPACITY, StreamOptions};
pub use stream::{BufferUpdate, Completion, StreamOutcome};
