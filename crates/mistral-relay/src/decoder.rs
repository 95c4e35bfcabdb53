use futures::StreamExt as _;
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::RelayError;
use crate::provider::ByteStream;
use crate::session::StreamSession;
use crate::stream::{BufferUpdate, Completion};

/// Reads `bytes` to completion, feeding `session` and sending one
/// [`BufferUpdate`] per delta to `sink`.
///
/// Every read and every send is raced against the session's abort signal,
/// and deltas are decoded one at a time between sends. On cancellation the
/// byte stream is dropped and nothing further is sent or decoded; the
/// accumulated text stays as it was. A dropped `sink` is treated the same
/// way. A read failure returns `Transport` and leaves the accumulated text in
/// `session`.
pub async fn decode_into(
    session: &mut StreamSession,
    mut bytes: ByteStream,
    sink: &mpsc::Sender<BufferUpdate>,
) -> Result<Completion, RelayError> {
    let signal = session.signal().clone();
    let request_id = session.request_id();
    let mut seq = 0_u64;

    loop {
        if signal.is_aborted() {
            return Ok(Completion::Cancelled);
        }
        let next = tokio::select! {
            biased;
            _ = signal.aborted() => {
                debug!(request_id = %request_id, "stream cancelled while reading");
                return Ok(Completion::Cancelled);
            }
            next = bytes.next() => next,
        };

        match next {
            Some(Ok(chunk)) => session.feed(&chunk),
            Some(Err(err)) => {
                debug!(request_id = %request_id, error = %err, "stream read failed");
                return Err(err);
            }
            None => session.end_input(),
        }

        loop {
            if signal.is_aborted() {
                return Ok(Completion::Cancelled);
            }
            let Some(text) = session.next_snapshot() else {
                break;
            };
            let update = BufferUpdate {
                request_id,
                seq,
                text,
            };
            tokio::select! {
                biased;
                _ = signal.aborted() => return Ok(Completion::Cancelled),
                sent = sink.send(update) => {
                    if sent.is_err() {
                        debug!(request_id = %request_id, "update receiver dropped");
                        return Ok(Completion::Cancelled);
                    }
                }
            }
            seq = seq.saturating_add(1);
        }

        if session.is_done() {
            let completion = if session.saw_sentinel() {
                Completion::Done
            } else {
                Completion::EndOfStream
            };
            debug!(request_id = %request_id, updates = seq, ?completion, "stream finished");
            return Ok(completion);
        }
    }
}
