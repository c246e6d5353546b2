//! Generation dispatcher.
//!
//! A single-consumer FIFO queue in front of the external text generator.
//! Every submitted text is generated in order, cleaned up and handed to the
//! callback(s) registered for it.

pub mod client;
pub mod prompt;
pub mod scripted;

pub use client::{HttpGenerator, LlmClientConfig};
pub use prompt::{PromptStyle, PromptTemplate, DEFAULT_SYSTEM_PROMPT};
pub use scripted::ScriptedGenerator;

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{Result, StarlogError};

/// Spoken when the generator fails or returns nothing usable.
pub const FALLBACK_UTTERANCE: &str = "I'm having trouble processing that, Commander.";

const CONVERSATIONAL_PREFIXES: &[&str] = &["Response:", "AI:", "Model:", "Assistant:", "Ship:"];

/// External text generator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_text: &str) -> Result<String>;
}

/// Deterministic cleanup applied to every generated reply.
///
/// Trims, drops one pair of matching surrounding quotes, drops one leading
/// conversational prefix, then trims again.
pub fn clean_response(raw: &str) -> String {
    let mut text = raw.trim();

    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        if (first == b'"' || first == b'\'') && bytes[bytes.len() - 1] == first {
            text = &text[1..text.len() - 1];
        }
    }

    if let Some(rest) = CONVERSATIONAL_PREFIXES
        .iter()
        .find_map(|prefix| text.strip_prefix(prefix))
    {
        text = rest;
    }

    text.trim().to_string()
}

/// Who receives a generated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallbackPolicy {
    /// Each submission's callback receives exactly that submission's reply.
    #[default]
    PerRequest,
    /// Every callback registered since the last dequeue receives the next
    /// reply produced, then the list is cleared.
    Shared,
}

impl FromStr for CallbackPolicy {
    type Err = StarlogError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "perrequest" => Ok(Self::PerRequest),
            "shared" => Ok(Self::Shared),
            other => Err(StarlogError::ConfigError(format!(
                "unknown callback policy: {other}"
            ))),
        }
    }
}

/// One-shot consumer of a generated reply.
pub type ResponseCallback = Box<dyn FnOnce(String) + Send + 'static>;

/// Configuration for the GenerationDispatcher loaded from environment variables
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub system_prompt: String,
    pub policy: CallbackPolicy,
    /// How long the idle worker waits before re-checking for stop
    pub poll_interval_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            system_prompt: std::env::var("STARLOG_SYSTEM_PROMPT")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            policy: std::env::var("STARLOG_CALLBACK_POLICY")
                .ok()
                .and_then(|v| v.parse::<CallbackPolicy>().ok())
                .unwrap_or_default(),
            poll_interval_ms: 500,
        }
    }
}

struct GenerationRequest {
    sequence: u64,
    text: String,
    callback: Option<ResponseCallback>,
}

struct Shared {
    generator: Arc<dyn TextGenerator>,
    system_prompt: Mutex<String>,
    policy: CallbackPolicy,
    poll_interval: Duration,
    queue: Mutex<VecDeque<GenerationRequest>>,
    shared_callbacks: Mutex<Vec<ResponseCallback>>,
    notify: Notify,
    next_sequence: AtomicU64,
}

impl Shared {
    async fn generate(&self, text: &str) -> String {
        let system_prompt = self.system_prompt.lock().clone();
        match self.generator.generate(&system_prompt, text).await {
            Ok(raw) => {
                let cleaned = clean_response(&raw);
                if cleaned.is_empty() {
                    warn!(target = "generation", "Generator returned an empty reply");
                    FALLBACK_UTTERANCE.to_string()
                } else {
                    cleaned
                }
            }
            Err(e) => {
                warn!(target = "generation", error = %e, "Generation failed");
                FALLBACK_UTTERANCE.to_string()
            }
        }
    }

    async fn run(self: Arc<Self>, stop: Arc<AtomicBool>) {
        info!(target = "generation", policy = ?self.policy, "Generation worker started");
        while !stop.load(Ordering::SeqCst) {
            let next = self.queue.lock().pop_front();
            let Some(request) = next else {
                let _ = tokio::time::timeout(self.poll_interval, self.notify.notified()).await;
                continue;
            };

            debug!(target = "generation", sequence = request.sequence, "Generating reply");
            let reply = self.generate(&request.text).await;

            let callbacks: Vec<ResponseCallback> = match self.policy {
                CallbackPolicy::PerRequest => request.callback.into_iter().collect(),
                CallbackPolicy::Shared => std::mem::take(&mut *self.shared_callbacks.lock()),
            };
            for callback in callbacks {
                let reply = reply.clone();
                if catch_unwind(AssertUnwindSafe(move || callback(reply))).is_err() {
                    error!(target = "generation", sequence = request.sequence, "Response callback panicked");
                }
            }
        }
        info!(target = "generation", "Generation worker stopped");
    }
}

/// A running worker and the stop flag only it observes.
struct Worker {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

pub struct GenerationDispatcher {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl GenerationDispatcher {
    pub fn new(generator: Arc<dyn TextGenerator>, config: GenerationConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                generator,
                system_prompt: Mutex::new(config.system_prompt),
                policy: config.policy,
                poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
                queue: Mutex::new(VecDeque::new()),
                shared_callbacks: Mutex::new(Vec::new()),
                notify: Notify::new(),
                next_sequence: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> CallbackPolicy {
        self.shared.policy
    }

    pub fn set_system_prompt(&self, prompt: impl Into<String>) {
        *self.shared.system_prompt.lock() = prompt.into();
    }

    /// Queue `text` for generation and start the worker if it is not running.
    ///
    /// Returns the request's sequence number.
    pub fn submit(&self, text: impl Into<String>, callback: Option<ResponseCallback>) -> u64 {
        let sequence = self.shared.next_sequence.fetch_add(1, Ordering::SeqCst);
        let callback = match (self.shared.policy, callback) {
            (CallbackPolicy::Shared, Some(cb)) => {
                self.shared.shared_callbacks.lock().push(cb);
                None
            }
            (_, cb) => cb,
        };
        self.shared.queue.lock().push_back(GenerationRequest {
            sequence,
            text: text.into(),
            callback,
        });
        self.shared.notify.notify_one();
        self.start();
        sequence
    }

    /// Generate directly, bypassing the queue.
    pub async fn generate_now(&self, text: &str) -> String {
        self.shared.generate(text).await
    }

    /// Start the worker if it is not already running. Needs a tokio runtime.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.as_ref().map(|w| !w.handle.is_finished()).unwrap_or(false) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(target = "generation", "No runtime available; worker not started");
            return;
        };
        let stop = Arc::new(AtomicBool::new(false));
        let handle = runtime.spawn(Arc::clone(&self.shared).run(Arc::clone(&stop)));
        *worker = Some(Worker { handle, stop });
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map(|w| !w.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Ask the worker to stop after the current item and wait for it.
    ///
    /// A submit racing with this call starts a fresh worker; the one being
    /// shut down still exits.
    pub async fn shutdown(&self) {
        let worker = self.worker.lock().take();
        if let Some(Worker { handle, stop }) = worker {
            stop.store(true, Ordering::SeqCst);
            self.shared.notify.notify_waiters();
            if let Err(e) = handle.await {
                warn!(target = "generation", error = %e, "Generation worker ended abnormally");
            }
        }
    }
}

impl Drop for GenerationDispatcher {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.stop.store(true, Ordering::SeqCst);
            worker.handle.abort();
        }
    }
}
