use crate::errors::RelayError;

/// Token accounting reported with a non-streaming completion.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Returns `choices[0].message.content` verbatim.
pub fn assistant_content(body: &serde_json::Value) -> Result<String, RelayError> {
    body.pointer("/choices/0/message/content")
        .and_then(|content| content.as_str())
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            RelayError::protocol("completion response has no choices[0].message.content")
        })
}

/// Reads the optional `usage` block.
pub fn usage(body: &serde_json::Value) -> Option<Usage> {
    body.get("usage")
        .and_then(|usage| serde_json::from_value(usage.clone()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_full_answer_verbatim() {
        let body = serde_json::json!({"choices":[{"message":{"content":"Full answer"}}]});
        assert_eq!(assistant_content(&body).expect("content"), "Full answer");
    }

    #[test]
    fn keeps_whitespace_and_empty_content() {
        let body = serde_json::json!({"choices":[{"message":{"content":"  spaced \n"}}]});
        assert_eq!(assistant_content(&body).expect("content"), "  spaced \n");
        let body = serde_json::json!({"choices":[{"message":{"content":""}}]});
        assert_eq!(assistant_content(&body).expect("content"), "");
    }

    #[test]
    fn missing_content_is_protocol_error() {
        let body = serde_json::json!({"choices":[]});
        assert!(matches!(
            assistant_content(&body),
            Err(RelayError::Protocol(_))
        ));
    }

    #[test]
    fn usage_is_read_when_present() {
        let body = serde_json::json!({
            "choices": [],
            "usage": {"prompt_tokens": 3, "completion_tokens": 5, "total_tokens": 8}
        });
        assert_eq!(
            usage(&body),
            Some(Usage {
                prompt_tokens: 3,
                completion_tokens: 5,
                total_tokens: 8
            })
        );
        assert_eq!(usage(&serde_json::json!({})), None);
    }
}
