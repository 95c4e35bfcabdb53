use std::collections::VecDeque;

use tracing::warn;

use crate::abort::AbortSignal;
use crate::sse::{DeltaEvent, LineEvent, LineFramer, parse_line};

/// Appends one delta to a buffer, returning the new buffer.
pub fn accumulate(buffer: &str, delta: &DeltaEvent) -> String {
    let mut next = String::with_capacity(buffer.len() + delta.text_fragment.len());
    next.push_str(buffer);
    next.push_str(&delta.text_fragment);
    next
}

/// State of one streaming exchange.
///
/// The session is the only writer of `accumulated_text`. The text is
/// append-only until `is_done`, after which further input is ignored. Input
/// is queued by line and decoded one delta per snapshot.
#[derive(Debug)]
pub struct StreamSession {
    request_id: uuid::Uuid,
    signal: AbortSignal,
    framer: LineFramer,
    pending_lines: VecDeque<String>,
    input_closed: bool,
    accumulated_text: String,
    is_done: bool,
    saw_sentinel: bool,
    malformed_lines: u64,
}

impl StreamSession {
    pub fn new(request_id: uuid::Uuid, signal: AbortSignal) -> Self {
        Self {
            request_id,
            signal,
            framer: LineFramer::default(),
            pending_lines: VecDeque::new(),
            input_closed: false,
            accumulated_text: String::new(),
            is_done: false,
            saw_sentinel: false,
            malformed_lines: 0,
        }
    }

    pub fn request_id(&self) -> uuid::Uuid {
        self.request_id
    }

    pub fn signal(&self) -> &AbortSignal {
        &self.signal
    }

    pub fn accumulated_text(&self) -> &str {
        &self.accumulated_text
    }

    pub fn is_done(&self) -> bool {
        self.is_done
    }

    /// True when the session ended on `[DONE]` rather than end of input.
    pub fn saw_sentinel(&self) -> bool {
        self.saw_sentinel
    }

    /// Number of `data: ` lines skipped because their payload was not JSON.
    pub fn malformed_lines(&self) -> u64 {
        self.malformed_lines
    }

    /// Queues the complete lines of one chunk without decoding them.
    ///
    /// Lines are decoded one delta at a time by [`Self::next_snapshot`], so
    /// the accumulated text never runs ahead of the last snapshot taken.
    pub fn feed(&mut self, chunk: &[u8]) {
        if self.is_done || self.input_closed {
            return;
        }
        self.pending_lines.extend(self.framer.push_chunk(chunk));
    }

    /// Marks end of input. An unterminated last line is decoded as if it were
    /// newline-terminated.
    pub fn end_input(&mut self) {
        if self.is_done || self.input_closed {
            return;
        }
        self.pending_lines.extend(self.framer.finish());
        self.input_closed = true;
    }

    /// Decodes queued lines up to the next delta and returns the cumulative
    /// text after it. `None` means more input is needed or the session is done.
    pub fn next_snapshot(&mut self) -> Option<String> {
        while !self.is_done {
            let Some(line) = self.pending_lines.pop_front() else {
                if self.input_closed {
                    self.is_done = true;
                }
                return None;
            };
            if let Some(text) = self.apply_line(&line) {
                return Some(text);
            }
        }
        None
    }

    /// Feeds one chunk and returns the cumulative text after each delta it
    /// completed, in order.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.feed(chunk);
        self.drain()
    }

    /// Ends input and returns the snapshots of any lines still queued.
    pub fn finish_input(&mut self) -> Vec<String> {
        self.end_input();
        self.drain()
    }

    fn drain(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.next_snapshot()).collect()
    }

    fn apply_line(&mut self, line: &str) -> Option<String> {
        match parse_line(line) {
            LineEvent::Ignored => None,
            LineEvent::Done => {
                self.is_done = true;
                self.saw_sentinel = true;
                self.pending_lines.clear();
                None
            }
            LineEvent::Malformed(err) => {
                self.malformed_lines += 1;
                warn!(request_id = %self.request_id, error = %err, "skipping malformed stream event");
                None
            }
            LineEvent::Delta(delta) => {
                self.accumulated_text = accumulate(&self.accumulated_text, &delta);
                Some(self.accumulated_text.clone())
            }
        }
    }
}
