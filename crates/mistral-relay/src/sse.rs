//! SSE line framing and event parsing.
//!
//! Both stages are pure: [`LineFramer`] turns arbitrarily split byte chunks
//! into complete text lines, and [`parse_line`] classifies one line without
//! ever failing the stream.

use crate::errors::DecodeError;

/// Prefix carried by every line of interest.
pub const DATA_PREFIX: &str = "data: ";
/// Payload marking the end of the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Splits a byte stream into newline-terminated text lines.
///
/// UTF-8 sequences split across chunks are held back until complete; invalid
/// sequences decode to U+FFFD. The trailing partial line is carried over to
/// the next chunk.
#[derive(Debug, Default)]
pub struct LineFramer {
    undecoded: Vec<u8>,
    carry: String,
}

impl LineFramer {
    /// Feeds one chunk and returns every line it completes, without the
    /// terminating `\n` (or `\r\n`).
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.undecoded.extend_from_slice(chunk);
        self.decode_available();
        self.drain_lines()
    }

    /// Flushes state at end of input and returns the unterminated last line,
    /// if any.
    pub fn finish(&mut self) -> Option<String> {
        if !self.undecoded.is_empty() {
            self.carry.push_str(&String::from_utf8_lossy(&self.undecoded));
            self.undecoded.clear();
        }
        let mut line = std::mem::take(&mut self.carry);
        if line.ends_with('\r') {
            line.pop();
        }
        (!line.is_empty()).then_some(line)
    }

    fn decode_available(&mut self) {
        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.undecoded[consumed..]) {
                Ok(text) => {
                    self.carry.push_str(text);
                    consumed = self.undecoded.len();
                    break;
                }
                Err(err) => {
                    let valid_end = consumed + err.valid_up_to();
                    self.carry
                        .push_str(&String::from_utf8_lossy(&self.undecoded[consumed..valid_end]));
                    match err.error_len() {
                        Some(invalid_len) => {
                            self.carry.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_end + invalid_len;
                        }
                        // incomplete sequence at the end: wait for the next chunk
                        None => {
                            consumed = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.undecoded.drain(..consumed);
    }

    fn drain_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(idx) = self.carry.find('\n') {
            let mut line: String = self.carry.drain(..=idx).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }
}

/// Incremental text decoded from one SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaEvent {
    pub text_fragment: String,
}

/// Classification of a single framed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Blank line, comment, non-data field, or an event without new text.
    Ignored,
    /// Terminal sentinel.
    Done,
    /// Non-empty text delta.
    Delta(DeltaEvent),
    /// Payload that is not JSON; skipped by the decoder.
    Malformed(DecodeError),
}

/// Parses one line into a [`LineEvent`]. Total over arbitrary input.
pub fn parse_line(line: &str) -> LineEvent {
    let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
        return LineEvent::Ignored;
    };
    let payload = rest.trim();
    if payload == DONE_SENTINEL {
        return LineEvent::Done;
    }
    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => return LineEvent::Malformed(DecodeError::new(payload, err.to_string())),
    };
    match extract_delta_content(&value) {
        Some(text) if !text.is_empty() => LineEvent::Delta(DeltaEvent {
            text_fragment: text.to_string(),
        }),
        _ => LineEvent::Ignored,
    }
}

/// Reads `choices[0].delta.content` from a chunk payload.
pub fn extract_delta_content(value: &serde_json::Value) -> Option<&str> {
    value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|content| content.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framer_carries_partial_lines_across_chunks() {
        let mut framer = LineFramer::default();
        assert!(framer.push_chunk(b"data: {\"a\":").is_empty());
        let lines = framer.push_chunk(b"1}\n\ndata: [DO");
        assert_eq!(lines, vec!["data: {\"a\":1}".to_string(), String::new()]);
        let lines = framer.push_chunk(b"NE]\r\n");
        assert_eq!(lines, vec!["data: [DONE]".to_string()]);
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn framer_holds_back_split_multibyte_characters() {
        let text = "data: héllo ✓\n";
        let bytes = text.as_bytes();
        let split = text.find('✓').expect("check mark") + 1;
        let mut framer = LineFramer::default();
        assert!(framer.push_chunk(&bytes[..split]).is_empty());
        let lines = framer.push_chunk(&bytes[split..]);
        assert_eq!(lines, vec!["data: héllo ✓".to_string()]);
    }

    #[test]
    fn framer_replaces_invalid_bytes() {
        let mut framer = LineFramer::default();
        let lines = framer.push_chunk(b"data: a\xffb\n");
        assert_eq!(lines, vec!["data: a\u{FFFD}b".to_string()]);
    }

    #[test]
    fn framer_finish_returns_unterminated_line() {
        let mut framer = LineFramer::default();
        assert!(framer.push_chunk(b"data: [DONE]").is_empty());
        assert_eq!(framer.finish().as_deref(), Some("data: [DONE]"));
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn parse_line_extracts_delta_content() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert_eq!(
            parse_line(line),
            LineEvent::Delta(DeltaEvent {
                text_fragment: "Hi".into()
            })
        );
    }

    #[test]
    fn parse_line_ignores_filler_and_empty_deltas() {
        assert_eq!(parse_line(""), LineEvent::Ignored);
        assert_eq!(parse_line(": keep-alive"), LineEvent::Ignored);
        assert_eq!(parse_line("event: message"), LineEvent::Ignored);
        assert_eq!(parse_line("data:{\"x\":1}"), LineEvent::Ignored);
        assert_eq!(
            parse_line(r#"data: {"choices":[{"delta":{"role":"assistant","content":""}}]}"#),
            LineEvent::Ignored
        );
        assert_eq!(
            parse_line(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#),
            LineEvent::Ignored
        );
        assert_eq!(parse_line(r#"data: {"choices":[]}"#), LineEvent::Ignored);
    }

    #[test]
    fn parse_line_detects_sentinel_with_surrounding_whitespace() {
        assert_eq!(parse_line("data: [DONE]"), LineEvent::Done);
        assert_eq!(parse_line("data:  [DONE]  "), LineEvent::Done);
    }

    #[test]
    fn parse_line_reports_malformed_payload() {
        match parse_line("data: not-json") {
            LineEvent::Malformed(err) => assert_eq!(err.payload, "not-json"),
            other => panic!("expected malformed, got {other:?}"),
        }
    }
}
