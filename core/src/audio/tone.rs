//! Fallback tone synthesis.
//!
//! Produces an audible sine tone whose length follows the text, so the audio
//! path can be exercised end to end without a speech engine.

use super::{AudioClip, SpeechSynthesizer};
use crate::Result;

pub const TONE_SAMPLE_RATE: u32 = 24_000;

const SECONDS_PER_CHAR: f32 = 0.08;
const ATTACK_SECS: f32 = 0.01;
const RELEASE_SECS: f32 = 0.1;

/// Voice names and the base pitch each one gets.
const VOICE_PITCHES: &[(&str, f32)] = &[
    ("alba", 440.0),
    ("marius", 392.0),
    ("javert", 349.23),
    ("jean", 329.63),
    ("fantine", 493.88),
    ("cosette", 523.25),
    ("eponine", 587.33),
    ("azelma", 659.25),
];

#[derive(Debug, Clone)]
pub struct ToneSynthesizer {
    voices: Vec<String>,
    sample_rate: u32,
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        Self {
            voices: VOICE_PITCHES.iter().map(|(name, _)| name.to_string()).collect(),
            sample_rate: TONE_SAMPLE_RATE,
        }
    }
}

impl ToneSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pitch(voice: &str) -> f32 {
        VOICE_PITCHES
            .iter()
            .find(|(name, _)| *name == voice)
            .map(|(_, hz)| *hz)
            .unwrap_or(440.0)
    }

    pub fn tone(&self, voice: &str, text: &str) -> AudioClip {
        let rate = self.sample_rate as f32;
        let n = (text.chars().count() as f32 * SECONDS_PER_CHAR * rate).round() as usize;
        let attack = ((ATTACK_SECS * rate) as usize).min(n);
        let release = ((RELEASE_SECS * rate) as usize).min(n);
        let freq = Self::pitch(voice);
        let w = 2.0 * std::f32::consts::PI * freq / rate;

        let samples = (0..n)
            .map(|i| {
                let x = w * i as f32;
                let wave = 0.3 * x.sin() + 0.1 * (2.0 * x).sin() + 0.05 * (3.0 * x).sin();
                let mut env = 1.0f32;
                if attack > 0 && i < attack {
                    env = env.min(i as f32 / attack as f32);
                }
                if release > 0 && i >= n - release {
                    env = env.min((n - i) as f32 / release as f32);
                }
                wave * env
            })
            .collect();

        AudioClip {
            samples,
            sample_rate: self.sample_rate,
        }
    }
}

impl SpeechSynthesizer for ToneSynthesizer {
    fn name(&self) -> &str {
        "tone"
    }

    fn voices(&self) -> &[String] {
        &self.voices
    }

    fn synthesize(&self, voice: &str, text: &str) -> Result<AudioClip> {
        Ok(self.tone(voice, text))
    }
}
