use serde::{Deserialize, Serialize};

use crate::capture::{CaptureResult, PNG_MIME};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// Base64 image attached to the current turn only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: String,
}

impl ImagePayload {
    pub fn png_base64(data: impl Into<String>) -> Self {
        Self {
            mime_type: PNG_MIME.into(),
            data: data.into(),
        }
    }
}

impl From<&CaptureResult> for ImagePayload {
    fn from(capture: &CaptureResult) -> Self {
        Self::png_base64(capture.to_base64())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "inlineData")]
        inline_data: ImagePayload,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Part::Image { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl ConversationTurn {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::text(text)],
        }
    }

    pub fn without_images(&self) -> Self {
        Self {
            role: self.role,
            parts: self.parts.iter().filter(|part| !part.is_image()).cloned().collect(),
        }
    }

    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                Part::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Prior turns of one panel session. Images are stripped on the way in, and
/// once `limit` turns are exceeded the oldest exchange is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
    limit: usize,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::with_limit(40)
    }
}

impl ConversationHistory {
    /// A `limit` of 0 keeps everything.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            turns: Vec::new(),
            limit,
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn record_exchange(&mut self, user_turn: &ConversationTurn, reply: &str) {
        self.turns.push(user_turn.without_images());
        self.turns.push(ConversationTurn::model_text(reply));

        if self.limit > 0 {
            while self.turns.len() > self.limit.max(2) {
                self.turns.drain(..2);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    /// Leave the choice to the backend.
    #[default]
    Auto,
    Minimal,
    Low,
    Medium,
    High,
}

impl ThinkingLevel {
    pub fn as_wire(&self) -> Option<&'static str> {
        match self {
            ThinkingLevel::Auto => None,
            ThinkingLevel::Minimal => Some("minimal"),
            ThinkingLevel::Low => Some("low"),
            ThinkingLevel::Medium => Some("medium"),
            ThinkingLevel::High => Some("high"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question_with_image(text: &str) -> ConversationTurn {
        ConversationTurn::user(vec![
            Part::text(text),
            Part::Image {
                inline_data: ImagePayload::png_base64("aGVsbG8="),
            },
        ])
    }

    #[test]
    fn history_never_stores_images() {
        let mut history = ConversationHistory::default();
        history.record_exchange(&question_with_image("what is this?"), "a spreadsheet");

        assert_eq!(history.len(), 2);
        assert!(history
            .turns()
            .iter()
            .all(|turn| turn.parts.iter().all(|part| !part.is_image())));
        assert_eq!(history.turns()[0].text(), "what is this?");
        assert_eq!(history.turns()[1].role, Role::Model);
    }

    #[test]
    fn oldest_exchange_is_dropped_past_the_limit() {
        let mut history = ConversationHistory::with_limit(4);
        for n in 0..3 {
            let turn = ConversationTurn::user(vec![Part::text(format!("q{n}"))]);
            history.record_exchange(&turn, &format!("a{n}"));
        }

        let texts: Vec<String> = history.turns().iter().map(ConversationTurn::text).collect();
        assert_eq!(texts, ["q1", "a1", "q2", "a2"]);
    }

    #[test]
    fn parts_serialize_in_gemini_shape() {
        let json = serde_json::to_value(question_with_image("hi")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "role": "user",
                "parts": [
                    {"text": "hi"},
                    {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}}
                ]
            })
        );
    }
}
