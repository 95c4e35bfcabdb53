use std::pin::Pin;

use crate::abort::AbortSignal;
use crate::errors::RelayError;
use crate::model::ProviderRequest;

/// Raw response body of a streaming completion.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, RelayError>> + Send + 'static>>;

/// Transport contract between the relay client and the completion provider.
///
/// `MistralProvider` is the HTTP implementation; tests drive the client
/// through in-memory implementations.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Opens a streaming completion and returns the body positioned at its
    /// first byte. `request.is_stream()` must be true.
    async fn open_stream(
        &self,
        request: &ProviderRequest,
        signal: &AbortSignal,
    ) -> Result<ByteStream, RelayError>;

    /// Runs a non-streaming completion and returns the provider's JSON body
    /// untouched. `request.is_stream()` must be false.
    async fn complete_raw(
        &self,
        request: &ProviderRequest,
        signal: &AbortSignal,
    ) -> Result<serde_json::Value, RelayError>;
}
