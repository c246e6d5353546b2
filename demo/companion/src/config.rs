use std::fs;
use std::path::{Path, PathBuf};

use starlog_audio::{PiperConfig, PlayerConfig};
use starlog_core::generation::PromptStyle;
use starlog_core::{CallbackPolicy, CompanionConfig, EdsmConfig, LlmClientConfig};

/// Everything the companion binary needs: the pipeline settings plus the
/// concrete collaborators to build.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub companion: CompanionConfig,
    pub llm: LlmClientConfig,
    pub edsm: EdsmConfig,
    pub piper: PiperConfig,
    pub player: PlayerConfig,
    /// Use the scripted generator instead of an LLM server
    pub offline: bool,
    /// Enrich arrivals with EDSM data
    pub lookup: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            companion: CompanionConfig::default(),
            llm: LlmClientConfig::default(),
            edsm: EdsmConfig::default(),
            piper: PiperConfig::default(),
            player: PlayerConfig::default(),
            offline: std::env::var("STARLOG_OFFLINE")
                .ok()
                .and_then(|v| v.parse::<bool>().ok())
                .unwrap_or(false),
            lookup: std::env::var("STARLOG_LOOKUP")
                .ok()
                .and_then(|v| v.parse::<bool>().ok())
                .unwrap_or(true),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file (path via STARLOG_CONFIG or ./starlog.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let path = std::env::var("STARLOG_CONFIG").unwrap_or_else(|_| "starlog.toml".into());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(p: &Path) -> Self {
        let default = Self::default();
        if !p.exists() {
            tracing::info!(target = "starlog_companion", path = %p.display(), "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<StarlogToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target = "starlog_companion", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target = "starlog_companion", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct StarlogToml {
    pub offline: Option<bool>,
    pub raw_text: Option<bool>,
    pub journal: Option<JournalToml>,
    pub events: Option<EventsToml>,
    pub llm: Option<LlmToml>,
    pub voice: Option<VoiceToml>,
    pub lookup: Option<LookupToml>,
}

impl StarlogToml {
    fn overlay(self, mut base: AppConfig) -> AppConfig {
        if let Some(x) = self.offline {
            base.offline = x;
        }
        if let Some(x) = self.raw_text {
            base.companion.raw_text = x;
        }
        if let Some(j) = self.journal {
            j.apply(&mut base.companion);
        }
        if let Some(e) = self.events {
            e.apply(&mut base.companion);
        }
        if let Some(l) = self.llm {
            l.apply(&mut base);
        }
        if let Some(v) = self.voice {
            v.apply(&mut base);
        }
        if let Some(l) = self.lookup {
            l.apply(&mut base);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct JournalToml {
    pub dir: Option<PathBuf>,
    pub bootstrap: Option<bool>,
    pub rotation_poll_ms: Option<u64>,
}
impl JournalToml {
    fn apply(self, c: &mut CompanionConfig) {
        if let Some(x) = self.dir {
            c.journal.dir = x;
        }
        if let Some(x) = self.bootstrap {
            c.journal.bootstrap = x;
        }
        if let Some(x) = self.rotation_poll_ms {
            c.journal.rotation_poll_ms = x.max(100);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct EventsToml {
    pub allow: Option<Vec<String>>,
    pub urgent: Option<Vec<String>>,
}
impl EventsToml {
    fn apply(self, c: &mut CompanionConfig) {
        if let Some(x) = self.allow {
            c.classifier.allow_list = x.into_iter().filter(|s| !s.is_empty()).collect();
        }
        if let Some(x) = self.urgent {
            c.classifier.urgent = x.into_iter().filter(|s| !s.is_empty()).collect();
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct LlmToml {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub prompt_style: Option<String>,
    pub system_prompt: Option<String>,
    pub callback_policy: Option<String>,
}
impl LlmToml {
    fn apply(self, c: &mut AppConfig) {
        if let Some(x) = self.base_url {
            c.llm.base_url = x;
        }
        if let Some(x) = self.model {
            c.llm.model = x;
        }
        if let Some(x) = self.api_key.filter(|s| !s.is_empty()) {
            c.llm.api_key = Some(x);
        }
        if let Some(x) = self.request_timeout_ms {
            c.llm.request_timeout_ms = x;
        }
        if let Some(x) = self.temperature {
            c.llm.temperature = x;
        }
        if let Some(x) = self.max_tokens {
            c.llm.max_tokens = x;
        }
        if let Some(x) = self.prompt_style.and_then(|s| s.parse::<PromptStyle>().ok()) {
            c.llm.style = x;
        }
        if let Some(x) = self.system_prompt {
            c.companion.generation.system_prompt = x;
        }
        if let Some(x) = self
            .callback_policy
            .and_then(|s| s.parse::<CallbackPolicy>().ok())
        {
            c.companion.generation.policy = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct VoiceToml {
    pub voice: Option<String>,
    pub piper_bin: Option<PathBuf>,
    pub piper_voice_dir: Option<PathBuf>,
    pub length_scale: Option<f32>,
    pub player: Option<String>,
    pub temp_dir: Option<PathBuf>,
}
impl VoiceToml {
    fn apply(self, c: &mut AppConfig) {
        if let Some(x) = self.voice {
            c.companion.audio.voice = x;
        }
        if let Some(x) = self.piper_bin {
            c.piper.bin = Some(x);
        }
        if let Some(x) = self.piper_voice_dir {
            c.piper.voice_dir = Some(x);
        }
        if let Some(x) = self.length_scale {
            c.piper.length_scale = x.clamp(0.5, 2.0);
        }
        if let Some(x) = self.player {
            c.player.preferred = Some(x);
        }
        if let Some(x) = self.temp_dir {
            c.player.temp_dir = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct LookupToml {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
}
impl LookupToml {
    fn apply(self, c: &mut AppConfig) {
        if let Some(x) = self.enabled {
            c.lookup = x;
        }
        if let Some(x) = self.base_url {
            c.edsm.base_url = x;
        }
        if let Some(x) = self.timeout_ms {
            c.edsm.request_timeout_ms = x;
            c.companion.lookup_timeout_ms = x;
        }
    }
}
