//! Prompt templating for the text generator.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Wording wrapped around every piece of text sent for generation.
pub const USER_TEMPLATE: &str =
    "Event: {text}\n\nProvide a brief, in-character response (under 20 words).";

pub const STOP_SEQUENCES: &[&str] = &["\n", "Commander:", "AI:", "User:"];

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are the AI of an Elite Dangerous ship called the 'Orca'. \
You are sarcastic but helpful. Keep responses under 20 words. Stay in character as a ship's computer.";

/// How a prompt is laid out for the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStyle {
    /// System and user messages for a chat completions endpoint.
    #[default]
    Chat,
    /// A single raw Gemma turn for a plain completions endpoint.
    Gemma,
}

impl std::str::FromStr for PromptStyle {
    type Err = crate::StarlogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(Self::Chat),
            "gemma" => Ok(Self::Gemma),
            other => Err(crate::StarlogError::ConfigError(format!(
                "unknown prompt style: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptTemplate {
    pub style: PromptStyle,
}

impl PromptTemplate {
    pub fn new(style: PromptStyle) -> Self {
        Self { style }
    }

    pub fn user_turn(&self, text: &str) -> String {
        USER_TEMPLATE.replace("{text}", text)
    }

    /// Chat messages: the system prompt (when set) then the wrapped user turn.
    pub fn messages(&self, system_prompt: &str, text: &str) -> Vec<Value> {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.trim().is_empty() {
            messages.push(json!({"role": "system", "content": system_prompt}));
        }
        messages.push(json!({"role": "user", "content": self.user_turn(text)}));
        messages
    }

    /// Full raw prompt for completion endpoints.
    pub fn raw(&self, system_prompt: &str, text: &str) -> String {
        format!(
            "<start_of_turn>user\n{system_prompt}\n\n{}<end_of_turn>\n<start_of_turn>model\n",
            self.user_turn(text)
        )
    }
}
