//! The companion: wires the journal tailer, classifier, session state and the
//! two dispatchers together and exposes the control surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::{AudioConfig, AudioDispatcher, PlaybackSink, SpeechSynthesizer};
use crate::classifier::{Classifier, ClassifierConfig, PriorityClass};
use crate::generation::{GenerationConfig, GenerationDispatcher, TextGenerator};
use crate::inbox::{Inbox, InboxHub, Notification, PipelineStatus};
use crate::journal::{JournalConfig, JournalWatcher, TailedRecord, Tailer};
use crate::lookup::{SystemInfoCache, SystemLookup};
use crate::record::EventKind;
use crate::state::{StateTracker, EMPTY_CONTEXT};
use crate::Result;

const STATUS_PREFIX: &str = "Ship's computer status update: ";
const SUMMARY_PREFIX: &str = "Summarize this game state in one brief sentence: ";

/// Grounded chat prompt around the current game state.
pub fn chat_prompt(context: &str, message: &str) -> String {
    format!(
        "CURRENT GAME STATE:\n{context}\n\n\
         IMPORTANT: You must ONLY use the information provided above in \"CURRENT GAME STATE\". \
         If the information is not available there, say you don't know. \
         Do NOT make up system names, locations, or any other information.\n\n\
         Commander's message: {message}"
    )
}

#[derive(Debug, Clone)]
pub struct CompanionConfig {
    pub journal: JournalConfig,
    pub classifier: ClassifierConfig,
    pub generation: GenerationConfig,
    pub audio: AudioConfig,
    /// Speak formatted text directly instead of generating replies
    pub raw_text: bool,
    /// Upper bound on one system lookup
    pub lookup_timeout_ms: u64,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            journal: JournalConfig::default(),
            classifier: ClassifierConfig::default(),
            generation: GenerationConfig::default(),
            audio: AudioConfig::default(),
            raw_text: std::env::var("STARLOG_RAW_TEXT")
                .ok()
                .and_then(|v| v.parse::<bool>().ok())
                .unwrap_or(false),
            lookup_timeout_ms: std::env::var("STARLOG_LOOKUP_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5_000),
        }
    }
}

/// External collaborators handed to the companion.
pub struct Collaborators {
    pub generator: Arc<dyn TextGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub sink: Arc<dyn PlaybackSink>,
    /// Enables arrival enrichment when set
    pub lookup: Option<Arc<dyn SystemLookup>>,
}

/// Per-record handling, shared by the pipeline task and chat.
struct Pipeline {
    state: Arc<StateTracker>,
    classifier: Classifier,
    generation: Arc<GenerationDispatcher>,
    audio: Arc<AudioDispatcher>,
    hub: Arc<InboxHub>,
    raw_text: bool,
}

impl Pipeline {
    async fn handle(&self, tailed: TailedRecord) {
        let record = &tailed.record;
        self.state.update(record);

        if matches!(record.kind(), EventKind::StateLoaded {}) {
            self.announce_state();
            return;
        }

        if tailed.silent {
            if let Some(event) = self.classifier.classify_silent(record) {
                self.hub.publish(Notification::Event(format!(
                    "[{}] {} (state loaded)",
                    record.timestamp(),
                    event.text
                )));
            }
            return;
        }

        let Some(event) = self.classifier.classify(record).await else {
            return;
        };
        self.hub.publish(Notification::Event(format!(
            "[{}] {}",
            record.timestamp(),
            event.text
        )));

        if let Some(line) = self.classifier.canned_response(&event) {
            self.hub
                .publish(Notification::Response(format!("[URGENT] {line}")));
            self.audio.submit(line, PriorityClass::Urgent);
            return;
        }

        if self.raw_text {
            self.hub.publish(Notification::Response(format!(
                "[{}] {}",
                event.type_name, event.text
            )));
            self.audio.submit(event.text, event.priority);
            return;
        }

        let hub = Arc::clone(&self.hub);
        let audio = Arc::clone(&self.audio);
        let type_name = event.type_name.clone();
        let priority = event.priority;
        self.generation.submit(
            format!("{STATUS_PREFIX}{}", event.text),
            Some(Box::new(move |reply: String| {
                hub.publish(Notification::Response(format!("[{type_name}] {reply}")));
                audio.submit(reply, priority);
            })),
        );
    }

    fn announce_state(&self) {
        let description = self.state.describe_context();
        if description.is_empty() || description == EMPTY_CONTEXT {
            return;
        }
        info!(target = "companion", summary = %description, "Session state loaded");
        self.hub.publish(Notification::Response(format!(
            "[STATE LOADED] {description}"
        )));

        if self.raw_text {
            self.audio.submit(description, PriorityClass::Normal);
            return;
        }
        let audio = Arc::clone(&self.audio);
        self.generation.submit(
            format!("{SUMMARY_PREFIX}{description}"),
            Some(Box::new(move |reply: String| {
                audio.submit(reply, PriorityClass::Normal);
            })),
        );
    }
}

/// Resources that live between `start` and `stop`.
struct Running {
    tasks: Vec<JoinHandle<()>>,
    watcher: Arc<Mutex<Option<JournalWatcher>>>,
}

pub struct Companion {
    config: CompanionConfig,
    pipeline: Arc<Pipeline>,
    running: AtomicBool,
    active: Mutex<Option<Running>>,
}

impl Companion {
    pub fn new(config: CompanionConfig, collaborators: Collaborators) -> Self {
        let state = Arc::new(StateTracker::new());
        let mut classifier = Classifier::new(config.classifier.clone());
        if let Some(lookup) = collaborators.lookup {
            let timeout = Duration::from_millis(config.lookup_timeout_ms);
            classifier = classifier.with_lookup(Arc::new(SystemInfoCache::new(lookup, timeout)));
        }
        let generation = Arc::new(GenerationDispatcher::new(
            collaborators.generator,
            config.generation.clone(),
        ));
        let audio = Arc::new(AudioDispatcher::new(
            collaborators.synthesizer,
            collaborators.sink,
            config.audio.clone(),
        ));

        let pipeline = Arc::new(Pipeline {
            state,
            classifier,
            generation,
            audio,
            hub: Arc::new(InboxHub::new()),
            raw_text: config.raw_text,
        });

        Self {
            config,
            pipeline,
            running: AtomicBool::new(false),
            active: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CompanionConfig {
        &self.config
    }

    pub fn state(&self) -> Arc<StateTracker> {
        Arc::clone(&self.pipeline.state)
    }

    pub fn audio(&self) -> Arc<AudioDispatcher> {
        Arc::clone(&self.pipeline.audio)
    }

    pub fn generation(&self) -> Arc<GenerationDispatcher> {
        Arc::clone(&self.pipeline.generation)
    }

    pub fn subscribe(&self) -> Inbox {
        self.pipeline.hub.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Attach to the newest journal and start every task.
    ///
    /// A missing directory or an empty one is not an error: the companion
    /// reports itself idle and keeps polling.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let dir = self.config.journal.dir.clone();
        info!(target = "companion", dir = %dir.display(), "Starting companion");

        let (tx, mut rx) = mpsc::unbounded_channel::<TailedRecord>();
        let tailer = Arc::new(Mutex::new(
            Tailer::new(
                dir.clone(),
                Box::new(move |record| {
                    let _ = tx.send(record);
                }),
            )
            .with_bootstrap(self.config.journal.bootstrap),
        ));

        let mut tasks = Vec::new();
        let pipeline = Arc::clone(&self.pipeline);
        tasks.push(tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                pipeline.handle(record).await;
            }
            debug!(target = "companion", "Record channel closed");
        }));

        self.pipeline.generation.start();
        self.pipeline.audio.start();

        let attached = poll_tailer(&tailer).await;
        let watcher = Arc::new(Mutex::new(start_watcher(&dir, &tailer)));

        let poll_every = Duration::from_millis(self.config.journal.rotation_poll_ms.max(10));
        let poll_tailer_ref = Arc::clone(&tailer);
        let poll_watcher = Arc::clone(&watcher);
        let hub = Arc::clone(&self.pipeline.hub);
        let mut was_attached = attached;
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let attached = poll_tailer(&poll_tailer_ref).await;
                if poll_watcher.lock().is_none() {
                    *poll_watcher.lock() = start_watcher(&dir, &poll_tailer_ref);
                }
                if attached && !was_attached {
                    hub.publish(Notification::Status(PipelineStatus::Running));
                }
                was_attached = attached;
            }
        }));

        *self.active.lock() = Some(Running { tasks, watcher });

        let status = if attached {
            PipelineStatus::Running
        } else {
            PipelineStatus::Idle(format!(
                "no journal files in {}",
                self.config.journal.dir.display()
            ))
        };
        info!(target = "companion", %status, "Companion started");
        self.pipeline.hub.publish(Notification::Status(status));
        Ok(())
    }

    /// Stop every task, silence audio and wait for both workers to end.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let active = self.active.lock().take();
        if let Some(active) = active {
            active.watcher.lock().take();
            for task in active.tasks {
                task.abort();
            }
        }
        self.pipeline.audio.stop();
        self.pipeline.generation.shutdown().await;
        self.pipeline.audio.shutdown().await;
        info!(target = "companion", "Companion stopped");
        self.pipeline
            .hub
            .publish(Notification::Status(PipelineStatus::Stopped));
    }

    /// Answer a message from the commander, grounded in the session state.
    pub fn submit_chat_message(&self, text: &str) {
        let message = text.trim();
        if message.is_empty() {
            return;
        }
        let pipeline = &self.pipeline;
        if !self.is_running() {
            pipeline.hub.publish(Notification::Status(PipelineStatus::Error(
                "start the companion before chatting".to_string(),
            )));
            return;
        }

        let context = pipeline.state.chat_context();
        if pipeline.raw_text {
            pipeline
                .hub
                .publish(Notification::Response(format!("[RAW DATA] {context}")));
            pipeline.audio.submit(context, PriorityClass::Normal);
            return;
        }

        debug!(target = "companion", message, "Chat message");
        let hub = Arc::clone(&pipeline.hub);
        let audio = Arc::clone(&pipeline.audio);
        pipeline.generation.submit(
            chat_prompt(&context, message),
            Some(Box::new(move |reply: String| {
                hub.publish(Notification::Response(format!("[CHAT] {reply}")));
                audio.submit(reply, PriorityClass::Normal);
            })),
        );
    }
}

/// Attach or re-target, then read anything appended. True when a journal is attached.
async fn poll_tailer(tailer: &Arc<Mutex<Tailer>>) -> bool {
    let tailer = Arc::clone(tailer);
    let result = tokio::task::spawn_blocking(move || {
        let mut tailer = tailer.lock();
        tailer.poll_for_rotation()?;
        tailer.on_file_changed()?;
        Ok::<_, crate::StarlogError>(tailer.current_file().is_some())
    })
    .await;
    match result {
        Ok(Ok(attached)) => attached,
        Ok(Err(e)) => {
            warn!(target = "companion", error = %e, "Journal poll failed");
            false
        }
        Err(e) => {
            warn!(target = "companion", error = %e, "Journal poll task failed");
            false
        }
    }
}

fn start_watcher(dir: &std::path::Path, tailer: &Arc<Mutex<Tailer>>) -> Option<JournalWatcher> {
    if !dir.is_dir() {
        return None;
    }
    match JournalWatcher::start(dir, Arc::clone(tailer)) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!(target = "companion", dir = %dir.display(), error = %e, "Journal watcher unavailable");
            None
        }
    }
}

impl Drop for Companion {
    fn drop(&mut self) {
        if let Some(active) = self.active.lock().take() {
            for task in active.tasks {
                task.abort();
            }
        }
    }
}
