/// Errors that end a relay call or a streaming session.
///
/// Per-line decode failures are not part of this taxonomy; see [`DecodeError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Missing/invalid credential or malformed caller request.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Network or stream I/O failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// Provider answered with a non-success HTTP status.
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },
    /// Provider response shape was not what the relay consumes.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Caller requested cancellation.
    #[error("cancelled")]
    Cancelled,
}

impl RelayError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates an upstream error for a provider status code.
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Returns the upstream HTTP status for `Upstream` errors.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for caller-initiated cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A single SSE event whose payload was not valid JSON.
///
/// Recorded and skipped by the decoder; never fatal to the stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed event payload ({reason}): {payload}")]
pub struct DecodeError {
    /// Payload text after the `data: ` prefix was stripped.
    pub payload: String,
    /// Parser diagnostic.
    pub reason: String,
}

impl DecodeError {
    pub(crate) fn new(payload: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            reason: reason.into(),
        }
    }
}

/// Terminal failure of a streaming exchange returned by `ChatStream::finish`.
///
/// `partial_text` holds whatever was accumulated before the failure; callers
/// decide whether to keep it, but must not present it as a complete answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{error}")]
pub struct StreamFailure {
    pub request_id: uuid::Uuid,
    pub error: RelayError,
    pub partial_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_exposes_status_and_message() {
        let err = RelayError::upstream(401, "Unauthorized");
        assert_eq!(err.upstream_status(), Some(401));
        assert_eq!(err.to_string(), "upstream error (401): Unauthorized");
        assert!(!err.is_cancelled());
        assert_eq!(RelayError::transport("reset").upstream_status(), None);
    }

    #[test]
    fn stream_failure_displays_inner_error() {
        let failure = StreamFailure {
            request_id: uuid::Uuid::nil(),
            error: RelayError::transport("connection reset"),
            partial_text: "Hi".into(),
        };
        assert_eq!(failure.to_string(), "transport error: connection reset");
    }
}
