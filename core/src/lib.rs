// Starlog Core Library
// Journal ingestion, classification, session state and dispatch pipeline

pub mod audio;
pub mod classifier;
pub mod companion;
pub mod generation;
pub mod inbox;
pub mod journal;
pub mod lookup;
pub mod record;
pub mod state;

// Export core types
pub use audio::{
    AudioClip, AudioConfig, AudioDispatcher, NullSink, PlaybackOutcome, PlaybackSink,
    SpeechSynthesizer, ToneSynthesizer,
};
pub use classifier::{ClassifiedEvent, Classifier, ClassifierConfig, PriorityClass};
pub use companion::{Collaborators, Companion, CompanionConfig};
pub use generation::{
    CallbackPolicy, GenerationConfig, GenerationDispatcher, HttpGenerator, LlmClientConfig,
    ScriptedGenerator, TextGenerator,
};
pub use inbox::{Inbox, InboxHub, Notification, PipelineStatus};
pub use journal::{JournalConfig, JournalWatcher, TailedRecord, Tailer, TailerCursor};
pub use lookup::{EdsmConfig, EdsmLookup, SystemInfo, SystemInfoCache, SystemLookup};
pub use record::{EventKind, RawRecord};
pub use state::{SessionState, StateTracker};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StarlogError {
    #[error("Journal error: {0}")]
    JournalError(String),

    #[error("Generation error: {0}")]
    GenerationError(String),

    #[error("Synthesis error: {0}")]
    SynthesisError(String),

    #[error("Playback error: {0}")]
    PlaybackError(String),

    #[error("Lookup error: {0}")]
    LookupError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, StarlogError>;
