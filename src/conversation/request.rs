use serde_json::{json, Value};

use super::types::{ConversationHistory, ConversationTurn, ImagePayload, Part, ThinkingLevel};

/// Always sent ahead of the persona; not user editable.
pub const CORE_DIRECTIVE: &str = "- When analysing a screenshot, your own character and your own chat bubble (the conversation text) may be visible. Ignore them and answer about the rest of the screen.";

/// Question used when a screenshot is attached without any typed text.
pub const SCREEN_FALLBACK_QUESTION: &str = "Tell me about this screen.";

/// Per-call knobs. The API key is deliberately kept out of `Debug`.
#[derive(Clone)]
pub struct TurnConfig {
    pub api_key: String,
    pub model: String,
    pub persona_directive: String,
    pub thinking_level: ThinkingLevel,
    pub search_enabled: bool,
}

/// What goes over the wire for one call. Built fresh every time.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub model: String,
    pub system_instruction: String,
    pub history: Vec<ConversationTurn>,
    pub current_turn: ConversationTurn,
    pub thinking_level: ThinkingLevel,
    pub search_enabled: bool,
}

pub fn system_instruction(persona_directive: &str) -> String {
    format!("{CORE_DIRECTIVE}\n\n{persona_directive}")
}

/// The user's turn: the typed question (or the screen fallback when only an
/// image is attached), followed by the image if any.
pub fn user_turn(question: &str, image: Option<ImagePayload>) -> ConversationTurn {
    let question = question.trim();
    let text = if question.is_empty() && image.is_some() {
        SCREEN_FALLBACK_QUESTION
    } else {
        question
    };

    let mut parts = vec![Part::text(text)];
    if let Some(inline_data) = image {
        parts.push(Part::Image { inline_data });
    }
    ConversationTurn::user(parts)
}

impl RequestEnvelope {
    pub fn build(
        current_turn: ConversationTurn,
        history: &ConversationHistory,
        config: &TurnConfig,
    ) -> Self {
        Self {
            model: config.model.clone(),
            system_instruction: system_instruction(&config.persona_directive),
            history: history.turns().to_vec(),
            current_turn,
            thinking_level: config.thinking_level,
            search_enabled: config.search_enabled,
        }
    }

    /// `generateContent` request body.
    pub fn to_gemini_body(&self) -> Value {
        let contents: Vec<&ConversationTurn> = self
            .history
            .iter()
            .chain(std::iter::once(&self.current_turn))
            .collect();

        let mut body = json!({
            "systemInstruction": { "parts": [{ "text": self.system_instruction }] },
            "contents": contents,
        });

        if let Some(level) = self.thinking_level.as_wire() {
            body["generationConfig"] = json!({ "thinkingConfig": { "thinkingLevel": level } });
        }

        if self.search_enabled {
            body["tools"] = json!([{ "googleSearch": {} }]);
        }

        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(search_enabled: bool, thinking_level: ThinkingLevel) -> TurnConfig {
        TurnConfig {
            api_key: "key".into(),
            model: "gemini-test".into(),
            persona_directive: "You are a dolphin.".into(),
            thinking_level,
            search_enabled,
        }
    }

    #[test]
    fn fallback_question_only_for_image_without_text() {
        let with_image = user_turn("  ", Some(ImagePayload::png_base64("AAAA")));
        assert_eq!(with_image.text(), SCREEN_FALLBACK_QUESTION);
        assert_eq!(with_image.parts.len(), 2);

        let typed = user_turn("what's this?", Some(ImagePayload::png_base64("AAAA")));
        assert_eq!(typed.text(), "what's this?");

        let empty = user_turn("", None);
        assert_eq!(empty.text(), "");
        assert_eq!(empty.parts.len(), 1);
    }

    #[test]
    fn core_directive_precedes_persona() {
        let instruction = system_instruction("You are a dolphin.");
        assert!(instruction.starts_with(CORE_DIRECTIVE));
        assert!(instruction.ends_with("You are a dolphin."));
    }

    #[test]
    fn history_is_prepended_verbatim() {
        let mut history = ConversationHistory::default();
        history.record_exchange(&user_turn("first", None), "reply one");

        let envelope = RequestEnvelope::build(
            user_turn("second", None),
            &history,
            &config(false, ThinkingLevel::Auto),
        );
        let body = envelope.to_gemini_body();
        let contents = body["contents"].as_array().unwrap();

        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["parts"][0]["text"], "first");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "second");
        assert!(body.get("tools").is_none());
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn search_and_thinking_are_attached_when_requested() {
        let envelope = RequestEnvelope::build(
            user_turn("weather?", None),
            &ConversationHistory::default(),
            &config(true, ThinkingLevel::High),
        );
        let body = envelope.to_gemini_body();

        assert_eq!(body["tools"], json!([{ "googleSearch": {} }]));
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingLevel"], "high");
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            system_instruction("You are a dolphin.")
        );
    }
}
