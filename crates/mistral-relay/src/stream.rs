/// Notification emitted after every delta: the full text so far.
///
/// `text` is a snapshot; callers replace their view with it instead of
/// concatenating. Update `seq + 1` always extends update `seq`'s text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferUpdate {
    pub request_id: uuid::Uuid,
    pub seq: u64,
    pub text: String,
}

/// How a streaming session ended without error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// The provider sent `[DONE]`.
    Done,
    /// The provider closed the body without a sentinel.
    EndOfStream,
    /// The caller aborted; `text` is partial.
    Cancelled,
}

/// Result of a streaming session that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamOutcome {
    pub request_id: uuid::Uuid,
    /// Full text, or for `Cancelled` the text of the last update delivered
    /// before the abort.
    pub text: String,
    pub completion: Completion,
    /// Lines skipped because their payload was not JSON.
    pub malformed_lines: u64,
}

impl StreamOutcome {
    /// True when the text is the provider's full answer.
    pub fn is_complete(&self) -> bool {
        !matches!(self.completion, Completion::Cancelled)
    }
}
