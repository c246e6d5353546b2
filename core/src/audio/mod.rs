//! Audio dispatcher.
//!
//! A single-consumer priority queue in front of the speech synthesizer and
//! the playback sink. Urgent submissions purge everything queued below them
//! and interrupt lower-priority playback already in progress.

pub mod queue;
pub mod tone;

pub use queue::{QueuedSpeech, SpeechQueue};
pub use tone::ToneSynthesizer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::classifier::PriorityClass;
use crate::{Result, StarlogError};

/// Mono PCM samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Speech engine. Calls block and run off the async runtime.
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    /// Fixed set of voice names this engine accepts.
    fn voices(&self) -> &[String];

    fn synthesize(&self, voice: &str, text: &str) -> Result<AudioClip>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Interrupted,
}

/// Audio output device. `play` blocks until the clip finishes or `interrupt`
/// is raised.
pub trait PlaybackSink: Send + Sync {
    fn play(&self, clip: &AudioClip, interrupt: &AtomicBool) -> Result<PlaybackOutcome>;

    fn stop(&self);
}

/// Sink without a device. With `realtime` it waits out the clip's duration
/// in small steps, honouring the interrupt flag.
#[derive(Debug, Default)]
pub struct NullSink {
    realtime: bool,
    stopped: AtomicBool,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn realtime() -> Self {
        Self {
            realtime: true,
            stopped: AtomicBool::new(false),
        }
    }
}

impl PlaybackSink for NullSink {
    fn play(&self, clip: &AudioClip, interrupt: &AtomicBool) -> Result<PlaybackOutcome> {
        self.stopped.store(false, Ordering::SeqCst);
        if !self.realtime {
            return Ok(PlaybackOutcome::Completed);
        }
        let step = Duration::from_millis(10);
        let mut remaining = clip.duration();
        while !remaining.is_zero() {
            if interrupt.load(Ordering::SeqCst) || self.stopped.load(Ordering::SeqCst) {
                return Ok(PlaybackOutcome::Interrupted);
            }
            let slice = remaining.min(step);
            std::thread::sleep(slice);
            remaining -= slice;
        }
        Ok(PlaybackOutcome::Completed)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Configuration for the AudioDispatcher loaded from environment variables
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub voice: String,
    pub poll_interval_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            voice: std::env::var("STARLOG_VOICE")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "alba".to_string()),
            poll_interval_ms: 500,
        }
    }
}

struct Shared {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    fallback: ToneSynthesizer,
    sink: Arc<dyn PlaybackSink>,
    voice: Mutex<String>,
    queue: Mutex<SpeechQueue>,
    /// Priority of the item being synthesized or played.
    current: Mutex<Option<PriorityClass>>,
    interrupt: AtomicBool,
    notify: Notify,
    poll_interval: Duration,
}

impl Shared {
    /// Pop the next item and mark it current in one step so an urgent
    /// submission always sees what is playing.
    fn take_next(&self) -> Option<QueuedSpeech> {
        let mut queue = self.queue.lock();
        let item = queue.pop()?;
        *self.current.lock() = Some(item.priority);
        self.interrupt.store(false, Ordering::SeqCst);
        Some(item)
    }

    fn speak_blocking(&self, item: &QueuedSpeech) -> Result<PlaybackOutcome> {
        let voice = self.voice.lock().clone();
        let clip = match self.synthesizer.synthesize(&voice, &item.text) {
            Ok(clip) => clip,
            Err(e) => {
                warn!(
                    target = "audio",
                    engine = self.synthesizer.name(),
                    error = %e,
                    "Synthesis failed; using fallback tone"
                );
                self.fallback.tone(&voice, &item.text)
            }
        };
        if self.interrupt.load(Ordering::SeqCst) {
            return Ok(PlaybackOutcome::Interrupted);
        }
        self.sink.play(&clip, &self.interrupt)
    }

    async fn run(self: Arc<Self>, stop: Arc<AtomicBool>) {
        info!(target = "audio", engine = self.synthesizer.name(), "Audio worker started");
        while !stop.load(Ordering::SeqCst) {
            let Some(item) = self.take_next() else {
                let _ = tokio::time::timeout(self.poll_interval, self.notify.notified()).await;
                continue;
            };

            debug!(
                target = "audio",
                sequence = item.sequence,
                priority = %item.priority,
                "Speaking"
            );
            let shared = Arc::clone(&self);
            let sequence = item.sequence;
            match tokio::task::spawn_blocking(move || shared.speak_blocking(&item)).await {
                Ok(Ok(PlaybackOutcome::Completed)) => {}
                Ok(Ok(PlaybackOutcome::Interrupted)) => {
                    info!(target = "audio", sequence, "Playback interrupted");
                }
                Ok(Err(e)) => warn!(target = "audio", sequence, error = %e, "Playback failed"),
                Err(e) => warn!(target = "audio", sequence, error = %e, "Speech task failed"),
            }
            *self.current.lock() = None;
        }
        info!(target = "audio", "Audio worker stopped");
    }
}

struct Worker {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

pub struct AudioDispatcher {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl AudioDispatcher {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        sink: Arc<dyn PlaybackSink>,
        config: AudioConfig,
    ) -> Self {
        let voice = if synthesizer.voices().iter().any(|v| *v == config.voice) {
            config.voice
        } else {
            let first = synthesizer.voices().first().cloned().unwrap_or_default();
            warn!(
                target = "audio",
                requested = %config.voice,
                using = %first,
                "Unknown voice; using the engine default"
            );
            first
        };
        Self {
            shared: Arc::new(Shared {
                synthesizer,
                fallback: ToneSynthesizer::new(),
                sink,
                voice: Mutex::new(voice),
                queue: Mutex::new(SpeechQueue::new()),
                current: Mutex::new(None),
                interrupt: AtomicBool::new(false),
                notify: Notify::new(),
                poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Queue `text` at `priority` and return its sequence number.
    ///
    /// Urgent items purge every queued item below urgent and interrupt a
    /// lower-priority item that is already playing.
    pub fn submit(&self, text: impl Into<String>, priority: PriorityClass) -> u64 {
        let sequence = {
            let mut queue = self.shared.queue.lock();
            let before = queue.len();
            let sequence = queue.push(text.into(), priority);
            if priority == PriorityClass::Urgent {
                let purged = (before + 1).saturating_sub(queue.len());
                if purged > 0 {
                    debug!(target = "audio", purged, "Purged queued speech for urgent item");
                }
                let playing = *self.shared.current.lock();
                if matches!(playing, Some(p) if p < PriorityClass::Urgent) {
                    self.shared.interrupt.store(true, Ordering::SeqCst);
                }
            }
            sequence
        };
        self.shared.notify.notify_one();
        self.start();
        sequence
    }

    /// Start the worker if it is not already running. Needs a tokio runtime.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.as_ref().map(|w| !w.handle.is_finished()).unwrap_or(false) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(target = "audio", "No runtime available; worker not started");
            return;
        };
        let stop = Arc::new(AtomicBool::new(false));
        let handle = runtime.spawn(Arc::clone(&self.shared).run(Arc::clone(&stop)));
        *worker = Some(Worker { handle, stop });
    }

    /// Interrupt playback and discard everything queued.
    pub fn stop(&self) {
        self.shared.interrupt.store(true, Ordering::SeqCst);
        self.shared.sink.stop();
        let dropped = self.shared.queue.lock().clear();
        debug!(target = "audio", dropped, "Audio stopped");
    }

    /// Stop and end the worker.
    pub async fn shutdown(&self) {
        let worker = self.worker.lock().take();
        self.stop();
        if let Some(Worker { handle, stop }) = worker {
            stop.store(true, Ordering::SeqCst);
            self.shared.notify.notify_waiters();
            if let Err(e) = handle.await {
                warn!(target = "audio", error = %e, "Audio worker ended abnormally");
            }
        }
    }

    pub fn voices(&self) -> Vec<String> {
        self.shared.synthesizer.voices().to_vec()
    }

    pub fn voice(&self) -> String {
        self.shared.voice.lock().clone()
    }

    /// Switch voice. Unknown names leave the current voice in place.
    pub fn set_voice(&self, name: &str) -> Result<()> {
        if !self.shared.synthesizer.voices().iter().any(|v| v == name) {
            return Err(StarlogError::ConfigError(format!("unknown voice: {name}")));
        }
        *self.shared.voice.lock() = name.to_string();
        info!(target = "audio", voice = name, "Voice changed");
        Ok(())
    }

    pub fn engine(&self) -> String {
        self.shared.synthesizer.name().to_string()
    }

    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_speaking(&self) -> bool {
        self.shared.current.lock().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map(|w| !w.handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for AudioDispatcher {
    fn drop(&mut self) {
        self.shared.interrupt.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.lock().take() {
            worker.stop.store(true, Ordering::SeqCst);
            worker.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Broken {
        voices: Vec<String>,
    }

    impl SpeechSynthesizer for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn voices(&self) -> &[String] {
            &self.voices
        }
        fn synthesize(&self, _voice: &str, _text: &str) -> Result<AudioClip> {
            Err(StarlogError::SynthesisError("no engine".into()))
        }
    }

    #[derive(Default)]
    struct Recording {
        clips: Mutex<Vec<usize>>,
    }

    impl PlaybackSink for Recording {
        fn play(&self, clip: &AudioClip, _interrupt: &AtomicBool) -> Result<PlaybackOutcome> {
            self.clips.lock().push(clip.samples.len());
            Ok(PlaybackOutcome::Completed)
        }
        fn stop(&self) {}
    }

    fn config() -> AudioConfig {
        AudioConfig {
            voice: "alba".into(),
            poll_interval_ms: 10,
        }
    }

    #[test]
    fn clip_duration() {
        let clip = AudioClip {
            samples: vec![0.0; 12_000],
            sample_rate: 24_000,
        };
        assert_eq!(clip.duration(), Duration::from_millis(500));
        assert_eq!(AudioClip::default().duration(), Duration::ZERO);
    }

    #[test]
    fn realtime_null_sink_honours_interrupt() {
        let sink = NullSink::realtime();
        let clip = ToneSynthesizer::new().tone("alba", "a long sentence to speak");
        let interrupt = AtomicBool::new(true);
        assert_eq!(sink.play(&clip, &interrupt).unwrap(), PlaybackOutcome::Interrupted);
        assert_eq!(
            NullSink::new().play(&clip, &interrupt).unwrap(),
            PlaybackOutcome::Completed
        );
    }

    #[test]
    fn set_voice_validates_name() {
        let audio = AudioDispatcher::new(Arc::new(ToneSynthesizer::new()), Arc::new(NullSink::new()), config());
        assert_eq!(audio.voice(), "alba");
        audio.set_voice("javert").unwrap();
        assert_eq!(audio.voice(), "javert");
        assert!(audio.set_voice("hal9000").is_err());
        assert_eq!(audio.voice(), "javert");
    }

    #[test]
    fn unknown_configured_voice_falls_back_to_first() {
        let audio = AudioDispatcher::new(
            Arc::new(ToneSynthesizer::new()),
            Arc::new(NullSink::new()),
            AudioConfig {
                voice: "hal9000".into(),
                poll_interval_ms: 10,
            },
        );
        assert_eq!(audio.voice(), "alba");
    }

    #[tokio::test]
    async fn synthesis_failure_plays_fallback_tone() {
        let sink = Arc::new(Recording::default());
        let audio = AudioDispatcher::new(
            Arc::new(Broken {
                voices: vec!["alba".into()],
            }),
            sink.clone(),
            config(),
        );
        audio.submit("ten chars!", PriorityClass::Normal);
        for _ in 0..100 {
            if !sink.clips.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        audio.shutdown().await;
        assert_eq!(*sink.clips.lock(), vec![19_200]);
    }
}
