//! Piper speech synthesis.
//!
//! Runs the Piper CLI with `--output_raw` and reads mono PCM16 from stdout.
//! Voices are the `*.onnx` models found in the voice directory, named by file
//! stem; each model's sample rate comes from its `.onnx.json` sidecar.
//!
//! Env overrides:
//! - PIPER_BIN, PIPER_VOICE_DIR, PIPER_VOICE
//! - PIPER_LENGTH_SCALE

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;
use starlog_core::{AudioClip, SpeechSynthesizer, StarlogError};
use tracing::{debug, info};

use crate::utils::get_from_env_or_path;
use crate::wav::pcm16_to_f32;

const DEFAULT_SAMPLE_RATE: u32 = 22_050;

#[derive(Clone, Debug)]
pub struct PiperConfig {
    pub bin: Option<PathBuf>,
    pub voice_dir: Option<PathBuf>,
    /// Model file added alongside those in `voice_dir`
    pub voice: Option<PathBuf>,
    pub length_scale: f32,
}

impl Default for PiperConfig {
    fn default() -> Self {
        Self {
            bin: get_from_env_or_path("PIPER_BIN", "piper"),
            voice_dir: std::env::var("PIPER_VOICE_DIR").ok().map(PathBuf::from),
            voice: std::env::var("PIPER_VOICE").ok().map(PathBuf::from),
            length_scale: std::env::var("PIPER_LENGTH_SCALE")
                .ok()
                .and_then(|s| s.parse::<f32>().ok())
                .map(|v| v.clamp(0.5, 2.0))
                .unwrap_or(1.0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelSidecar {
    audio: SidecarAudio,
}

#[derive(Debug, Deserialize)]
struct SidecarAudio {
    sample_rate: u32,
}

#[derive(Debug, Clone)]
struct Voice {
    name: String,
    model: PathBuf,
    sample_rate: u32,
}

fn voice_name(model: &Path) -> Option<String> {
    let name = model.file_name()?.to_str()?;
    name.strip_suffix(".onnx").map(|s| s.to_string())
}

fn sample_rate_for(model: &Path) -> u32 {
    let sidecar = PathBuf::from(format!("{}.json", model.display()));
    std::fs::read(&sidecar)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<ModelSidecar>(&bytes).ok())
        .map(|s| s.audio.sample_rate)
        .unwrap_or(DEFAULT_SAMPLE_RATE)
}

fn discover_voices(cfg: &PiperConfig) -> Vec<Voice> {
    let mut models: Vec<PathBuf> = cfg
        .voice_dir
        .as_ref()
        .and_then(|dir| std::fs::read_dir(dir).ok())
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && voice_name(p).is_some())
                .collect()
        })
        .unwrap_or_default();
    if let Some(extra) = cfg.voice.as_ref().filter(|p| p.is_file()) {
        if !models.contains(extra) {
            models.push(extra.clone());
        }
    }
    models.sort();

    models
        .into_iter()
        .filter_map(|model| {
            let name = voice_name(&model)?;
            let sample_rate = sample_rate_for(&model);
            Some(Voice {
                name,
                model,
                sample_rate,
            })
        })
        .collect()
}

pub struct PiperSynthesizer {
    bin: PathBuf,
    length_scale: f32,
    voices: Vec<Voice>,
    names: Vec<String>,
}

impl PiperSynthesizer {
    /// Probe for the binary and voice models. Fails when either is missing so
    /// the caller can fall back to tone synthesis.
    pub fn new(cfg: PiperConfig) -> starlog_core::Result<Self> {
        let bin = cfg
            .bin
            .clone()
            .ok_or_else(|| StarlogError::SynthesisError("Piper binary not found".into()))?;
        let voices = discover_voices(&cfg);
        if voices.is_empty() {
            return Err(StarlogError::SynthesisError(
                "No Piper voices found; set PIPER_VOICE_DIR or PIPER_VOICE".into(),
            ));
        }
        let names: Vec<String> = voices.iter().map(|v| v.name.clone()).collect();
        info!(target = "piper", bin = ?bin, voices = ?names, "Detected Piper");
        Ok(Self {
            bin,
            length_scale: cfg.length_scale,
            voices,
            names,
        })
    }

    pub fn from_env() -> starlog_core::Result<Self> {
        Self::new(PiperConfig::default())
    }

    fn voice(&self, name: &str) -> &Voice {
        self.voices
            .iter()
            .find(|v| v.name == name)
            .unwrap_or(&self.voices[0])
    }
}

impl SpeechSynthesizer for PiperSynthesizer {
    fn name(&self) -> &str {
        "piper"
    }

    fn voices(&self) -> &[String] {
        &self.names
    }

    fn synthesize(&self, voice: &str, text: &str) -> starlog_core::Result<AudioClip> {
        let voice = self.voice(voice);
        let mut cmd = Command::new(&self.bin);
        cmd.arg("-m").arg(&voice.model);
        cmd.arg("--output_raw");
        cmd.arg("--length_scale")
            .arg(format!("{:.2}", self.length_scale));
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        debug!(target = "piper", command = ?cmd, "Running piper");
        let mut child = cmd.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            // A piper that exits early is reported through its status below.
            if let Err(e) = stdin.write_all(text.as_bytes()) {
                debug!(target = "piper", error = %e, "Failed to write text to piper");
            }
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(StarlogError::SynthesisError(format!(
                "Piper failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(AudioClip {
            samples: pcm16_to_f32(&output.stdout),
            sample_rate: voice.sample_rate,
        })
    }
}
