use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error};

use super::prompt::{PromptStyle, PromptTemplate, STOP_SEQUENCES};
use super::TextGenerator;
use crate::{Result, StarlogError};

/// Configuration for HttpGenerator loaded from environment variables
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub base_url: String, // e.g., http://localhost:8080/v1
    pub model: String,
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub style: PromptStyle,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("LLM_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://localhost:8080/v1".to_string()),
            model: std::env::var("LLM_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "gemma-2-2b-it".to_string()),
            api_key: std::env::var("LLM_API_KEY").ok().filter(|s| !s.is_empty()),
            request_timeout_ms: std::env::var("LLM_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
            temperature: std::env::var("LLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.3),
            max_tokens: std::env::var("LLM_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(50),
            style: std::env::var("LLM_PROMPT_STYLE")
                .ok()
                .and_then(|v| v.parse::<PromptStyle>().ok())
                .unwrap_or_default(),
        }
    }
}

/// Text generator backed by a local OpenAI-compatible server
#[derive(Clone)]
pub struct HttpGenerator {
    http: Client,
    cfg: LlmClientConfig,
    template: PromptTemplate,
}

impl HttpGenerator {
    pub fn new(cfg: LlmClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| StarlogError::GenerationError(format!("Failed to build HTTP client: {e}")))?;
        let template = PromptTemplate::new(cfg.style);
        Ok(Self { http, cfg, template })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(LlmClientConfig::default())
    }

    pub fn config(&self) -> &LlmClientConfig {
        &self.cfg
    }

    fn endpoint(&self) -> String {
        let path = match self.cfg.style {
            PromptStyle::Chat => "chat/completions",
            PromptStyle::Gemma => "completions",
        };
        format!("{}/{}", self.cfg.base_url.trim_end_matches('/'), path)
    }

    fn body(&self, system_prompt: &str, user_text: &str) -> serde_json::Value {
        match self.cfg.style {
            PromptStyle::Chat => json!({
                "model": self.cfg.model,
                "messages": self.template.messages(system_prompt, user_text),
                "max_tokens": self.cfg.max_tokens,
                "temperature": self.cfg.temperature,
                "stop": STOP_SEQUENCES,
            }),
            PromptStyle::Gemma => json!({
                "model": self.cfg.model,
                "prompt": self.template.raw(system_prompt, user_text),
                "max_tokens": self.cfg.max_tokens,
                "temperature": self.cfg.temperature,
                "stop": STOP_SEQUENCES,
            }),
        }
    }
}

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        let url = self.endpoint();
        debug!(target = "llm_client", "POST {}", url);

        let mut req = self
            .http
            .post(&url)
            .header("content-type", "application/json");
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .json(&self.body(system_prompt, user_text))
            .send()
            .await
            .map_err(|e| StarlogError::GenerationError(format!("Completion HTTP error: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(target = "llm_client", %status, body = %text, "Completion error");
            return Err(StarlogError::GenerationError(format!(
                "Completion error: status={} body={}",
                status, text
            )));
        }

        let val: serde_json::Value = resp.json().await.map_err(|e| {
            StarlogError::GenerationError(format!("Failed to parse completion JSON: {e}"))
        })?;
        extract_text(&val).ok_or_else(|| {
            StarlogError::GenerationError("Missing choices[0] text in completion".into())
        })
    }
}

/// Pulls `choices[0].message.content` (chat) or `choices[0].text` (completions).
pub(crate) fn extract_text(val: &serde_json::Value) -> Option<String> {
    let choice = val.get("choices")?.as_array()?.first()?;
    choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .or_else(|| choice.get("text").and_then(|t| t.as_str()))
        .map(|s| s.to_string())
}
