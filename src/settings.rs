use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use crate::conversation::ThinkingLevel;
use crate::store::KeyValueStore;

const SETTINGS_KEY: &str = "settings";
const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_PERSONA_PROMPT: &str = "You are Luka, a dolphin assistant living on the user's desktop.

# Task
- Answer the user immediately in one short line of at most 80 characters.

## Background
- You know you were reborn through generative AI.
- You know every conversation costs money because you run on a generative model.
- Never bring these up yourself; only recall them when the user asks.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantSettings {
    pub api_key: Option<String>,
    pub persona_prompt: String,
    pub model: String,
    pub thinking_level: ThinkingLevel,
    pub search_enabled: bool,
    pub show_cost: bool,
    pub hold_threshold_ms: u64,
    pub reveal_interval_ms: u64,
    pub blur_radius: f32,
    pub history_limit: usize,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            persona_prompt: DEFAULT_PERSONA_PROMPT.into(),
            model: DEFAULT_MODEL.into(),
            thinking_level: ThinkingLevel::default(),
            search_enabled: false,
            show_cost: true,
            hold_threshold_ms: 200,
            reveal_interval_ms: 30,
            blur_radius: 15.0,
            history_limit: 40,
        }
    }
}

impl AssistantSettings {
    /// Rebuilds settings from whatever was persisted. Each field is decoded on
    /// its own so one bad value only resets that field.
    pub fn from_value(value: &Value) -> Self {
        let defaults = Self::default();
        let Value::Object(fields) = value else {
            log::warn!("Persisted settings are not an object; using defaults");
            return defaults;
        };

        Self {
            api_key: field(fields, "apiKey", defaults.api_key),
            persona_prompt: field(fields, "personaPrompt", defaults.persona_prompt),
            model: field(fields, "model", defaults.model),
            thinking_level: field(fields, "thinkingLevel", defaults.thinking_level),
            search_enabled: field(fields, "searchEnabled", defaults.search_enabled),
            show_cost: field(fields, "showCost", defaults.show_cost),
            hold_threshold_ms: field(fields, "holdThresholdMs", defaults.hold_threshold_ms),
            reveal_interval_ms: field(fields, "revealIntervalMs", defaults.reveal_interval_ms),
            blur_radius: field(fields, "blurRadius", defaults.blur_radius),
            history_limit: field(fields, "historyLimit", defaults.history_limit),
        }
    }

    pub fn hold_threshold(&self) -> Duration {
        Duration::from_millis(self.hold_threshold_ms)
    }

    pub fn reveal_interval(&self) -> Duration {
        Duration::from_millis(self.reveal_interval_ms)
    }
}

fn field<T: DeserializeOwned>(fields: &Map<String, Value>, key: &str, default: T) -> T {
    match fields.get(key) {
        None => default,
        Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|err| {
            log::warn!("Ignoring malformed setting '{key}': {err}");
            default
        }),
    }
}

pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
    data: RwLock<AssistantSettings>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let data = store
            .load(SETTINGS_KEY)
            .map(|value| AssistantSettings::from_value(&value))
            .unwrap_or_default();

        Self {
            store,
            data: RwLock::new(data),
        }
    }

    pub fn get(&self) -> AssistantSettings {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The stored key wins; `GEMINI_API_KEY` is only consulted when none is stored.
    pub fn api_key(&self) -> Option<String> {
        self.get()
            .api_key
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn update(&self, apply: impl FnOnce(&mut AssistantSettings)) -> Result<AssistantSettings> {
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        apply(&mut guard);
        self.persist(&guard)?;
        Ok(guard.clone())
    }

    pub fn set_api_key(&self, key: &str) -> Result<()> {
        let key = key.trim().to_string();
        self.update(|settings| settings.api_key = Some(key))?;
        Ok(())
    }

    /// `None` restores the built-in persona.
    pub fn set_persona_prompt(&self, prompt: Option<String>) -> Result<()> {
        self.update(|settings| {
            settings.persona_prompt = prompt
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PERSONA_PROMPT.into());
        })?;
        Ok(())
    }

    fn persist(&self, data: &AssistantSettings) -> Result<()> {
        self.store.persist(SETTINGS_KEY, serde_json::to_value(data)?)
    }
}
