//! Classification of backend payloads.
//!
//! Backends (and the proxies in front of them) hand back a few different
//! shapes. The payload is sorted into a [`ResponseShape`] up front; text and
//! usage extraction then work off that enum instead of probing fields ad hoc.

use serde::Deserialize;
use serde_json::Value;

use crate::cost::UsageRecord;

pub const APOLOGY_TEXT: &str = "Sorry, the words just won't come out right now.";

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// `{ "text": .. }` or `{ "response": { "text": .. } }`, as produced by SDK
    /// style wrappers.
    Direct(String),
    /// Raw `generateContent` output; text of the first candidate.
    Candidates(String),
    /// Nothing recognisable carried any text.
    Unrecognized,
}

impl ResponseShape {
    pub fn classify(payload: &Value) -> Self {
        if let Some(text) = direct_text(payload) {
            return ResponseShape::Direct(text);
        }
        if let Some(text) = candidate_text(payload) {
            return ResponseShape::Candidates(text);
        }
        ResponseShape::Unrecognized
    }

    /// The reply to show; never empty.
    pub fn into_text(self) -> String {
        match self {
            ResponseShape::Direct(text) | ResponseShape::Candidates(text) => text,
            ResponseShape::Unrecognized => APOLOGY_TEXT.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedReply {
    pub text: String,
    pub usage: Option<UsageRecord>,
}

pub fn extract_reply(payload: &Value) -> ExtractedReply {
    let shape = ResponseShape::classify(payload);
    if shape == ResponseShape::Unrecognized {
        log::warn!("Backend response carried no text; substituting apology");
    }

    ExtractedReply {
        text: shape.into_text(),
        usage: extract_usage(payload),
    }
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(str::trim).filter(|text| !text.is_empty()).map(str::to_owned)
}

fn direct_text(payload: &Value) -> Option<String> {
    non_empty(payload.get("text").and_then(Value::as_str)).or_else(|| {
        non_empty(
            payload
                .get("response")
                .and_then(|response| response.get("text"))
                .and_then(Value::as_str),
        )
    })
}

fn candidate_text(payload: &Value) -> Option<String> {
    let candidates: Vec<Candidate> =
        serde_json::from_value(payload.get("candidates")?.clone()).ok()?;
    let content = candidates.into_iter().next()?.content?;

    let text: String = content
        .parts
        .into_iter()
        .filter(|part| !part.thought)
        .filter_map(|part| part.text)
        .collect();
    non_empty(Some(&text))
}

#[derive(Deserialize)]
struct RawUsage {
    #[serde(
        default,
        rename = "promptTokenCount",
        alias = "prompt_token_count",
        alias = "prompt_tokens"
    )]
    prompt: Option<u64>,
    #[serde(
        default,
        rename = "candidatesTokenCount",
        alias = "candidates_token_count",
        alias = "completion_tokens"
    )]
    completion: Option<u64>,
}

const USAGE_KEYS: [&str; 2] = ["usageMetadata", "usage_metadata"];

/// Token usage, looked up at the top level, under `response`, then on the
/// first candidate. `None` means there is nothing to charge.
pub fn extract_usage(payload: &Value) -> Option<UsageRecord> {
    let first_candidate = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first());

    let containers = [Some(payload), payload.get("response"), first_candidate];

    containers
        .into_iter()
        .flatten()
        .flat_map(|container| USAGE_KEYS.iter().filter_map(move |key| container.get(*key)))
        .find_map(|raw| serde_json::from_value::<RawUsage>(raw.clone()).ok())
        .map(|raw| UsageRecord {
            prompt_tokens: raw.prompt.unwrap_or(0),
            completion_tokens: raw.completion.unwrap_or(0),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_generate_content_payload() {
        let payload = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "thinking...", "thought": true},
                        {"text": "Looks like a calendar."}
                    ]
                }
            }],
            "usageMetadata": {"promptTokenCount": 1290, "candidatesTokenCount": 12}
        });

        let reply = extract_reply(&payload);
        assert_eq!(reply.text, "Looks like a calendar.");
        assert_eq!(
            reply.usage,
            Some(UsageRecord { prompt_tokens: 1290, completion_tokens: 12 })
        );
    }

    #[test]
    fn direct_text_wins_over_candidates() {
        let payload = json!({
            "text": "Hello!",
            "candidates": [{"content": {"parts": [{"text": "ignored"}]}}]
        });
        assert_eq!(ResponseShape::classify(&payload), ResponseShape::Direct("Hello!".into()));
    }

    #[test]
    fn empty_direct_text_falls_through() {
        let payload = json!({
            "response": {"text": ""},
            "candidates": [{"content": {"parts": [{"text": "from candidate"}]}}]
        });
        assert_eq!(
            ResponseShape::classify(&payload),
            ResponseShape::Candidates("from candidate".into())
        );
    }

    #[test]
    fn unknown_shape_gets_apology_and_no_usage() {
        let payload = json!({"candidates": [{"finishReason": "SAFETY"}]});
        let reply = extract_reply(&payload);
        assert_eq!(reply.text, APOLOGY_TEXT);
        assert_eq!(reply.usage, None);

        assert_eq!(extract_reply(&json!("just a string")).text, APOLOGY_TEXT);
    }

    #[test]
    fn usage_in_snake_case_under_response() {
        let payload = json!({
            "response": {
                "text": "ok",
                "usage_metadata": {"prompt_token_count": 7, "candidates_token_count": 3}
            }
        });
        assert_eq!(
            extract_usage(&payload),
            Some(UsageRecord { prompt_tokens: 7, completion_tokens: 3 })
        );
    }

    #[test]
    fn usage_on_first_candidate() {
        let payload = json!({
            "candidates": [{
                "content": {"parts": [{"text": "hi"}]},
                "usageMetadata": {"promptTokenCount": 5}
            }]
        });
        assert_eq!(
            extract_usage(&payload),
            Some(UsageRecord { prompt_tokens: 5, completion_tokens: 0 })
        );
    }
}
