//! Event classification.
//!
//! The [`Classifier`] filters raw records against an allow-list, assigns a
//! [`PriorityClass`] and renders accepted records into a sentence. Arrivals
//! are enriched with a cached system description when a lookup is configured.

pub mod canned;
pub mod format;

pub use canned::CannedResponses;
pub use format::format;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::lookup::SystemInfoCache;
use crate::record::{EventKind, RawRecord};
use crate::StarlogError;

pub const DEFAULT_ALLOW_LIST: &[&str] = &[
    "Arrival",
    "DockingGranted",
    "DockingDenied",
    "DockingRequested",
    "DockingCancelled",
    "Docked",
    "Undocked",
    "ShieldState",
    "FuelCritical",
    "FuelFull",
    "Bounty",
    "Destroyed",
    "Resurrect",
    "MaterialCollected",
    "MaterialDiscarded",
    "StartJump",
    "SupercruiseEntry",
    "SupercruiseExit",
    "Scan",
    "SignalsFound",
    "HullDamage",
    "UnderAttack",
    "Interdicted",
    "MissionAccepted",
    "MissionCompleted",
    "MissionFailed",
    "SessionStart",
    "Refuel",
    "Cargo",
    "Synthesis",
];

pub const DEFAULT_URGENT: &[&str] = &["FuelCritical", "Destroyed", "ShieldState"];

const HIGH: &[&str] = &["Arrival", "DockingGranted", "Scan"];
const NORMAL: &[&str] = &["MaterialCollected", "Bounty", "MissionCompleted"];

/// Ordered urgency, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityClass {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for PriorityClass {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        };
        f.write_str(s)
    }
}

impl FromStr for PriorityClass {
    type Err = StarlogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(StarlogError::ConfigError(format!(
                "unknown priority class: {other}"
            ))),
        }
    }
}

impl PriorityClass {
    /// Parse user input, degrading to `Normal` on anything unrecognised.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_else(|e| {
            warn!(target = "classifier", input = s, error = %e, "Falling back to normal priority");
            Self::Normal
        })
    }
}

/// An accepted record with its priority and rendered sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedEvent {
    pub type_name: String,
    pub kind: EventKind,
    pub priority: PriorityClass,
    pub text: String,
    pub is_urgent: bool,
    pub raw: RawRecord,
}

/// Configuration for the Classifier loaded from environment variables
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub allow_list: HashSet<String>,
    pub urgent: HashSet<String>,
}

fn env_set(key: &str, default: &[&str]) -> HashSet<String> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_else(|| default.iter().map(|s| s.to_string()).collect())
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            allow_list: env_set("STARLOG_ALLOW_LIST", DEFAULT_ALLOW_LIST),
            urgent: env_set("STARLOG_URGENT_EVENTS", DEFAULT_URGENT),
        }
    }
}

pub struct Classifier {
    config: ClassifierConfig,
    cache: Option<Arc<SystemInfoCache>>,
    canned: CannedResponses,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            cache: None,
            canned: CannedResponses::new(),
        }
    }

    /// Enrich arrivals through `cache`.
    pub fn with_lookup(mut self, cache: Arc<SystemInfoCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn is_accepted(&self, record: &RawRecord) -> bool {
        self.config.allow_list.contains(record.type_name())
    }

    pub fn is_urgent(&self, record: &RawRecord) -> bool {
        self.config.urgent.contains(record.type_name())
    }

    pub fn priority_of(&self, record: &RawRecord) -> PriorityClass {
        let type_name = record.type_name();
        if self.is_urgent(record) {
            PriorityClass::Urgent
        } else if HIGH.contains(&type_name) {
            PriorityClass::High
        } else if NORMAL.contains(&type_name) {
            PriorityClass::Normal
        } else {
            PriorityClass::Low
        }
    }

    /// Classify a live record, looking up arrival enrichment when configured.
    pub async fn classify(&self, record: &RawRecord) -> Option<ClassifiedEvent> {
        if !self.is_accepted(record) {
            return None;
        }
        let kind = record.kind();
        let enrichment = match (&kind, &self.cache) {
            (EventKind::Arrival { system: Some(system), .. }, Some(cache)) => cache
                .get(system)
                .await
                .map(|info| info.description()),
            _ => None,
        };
        Some(self.build(record, kind, enrichment.as_deref()))
    }

    /// Classify without any lookup. Used for replayed records.
    pub fn classify_silent(&self, record: &RawRecord) -> Option<ClassifiedEvent> {
        if !self.is_accepted(record) {
            return None;
        }
        Some(self.build(record, record.kind(), None))
    }

    /// Next canned line for an urgent event, if its kind has one.
    pub fn canned_response(&self, event: &ClassifiedEvent) -> Option<&'static str> {
        if !event.is_urgent {
            return None;
        }
        self.canned.next(&event.kind)
    }

    fn build(&self, record: &RawRecord, kind: EventKind, enrichment: Option<&str>) -> ClassifiedEvent {
        let text = format(&kind, enrichment);
        let priority = self.priority_of(record);
        debug!(
            target = "classifier",
            event = record.type_name(),
            %priority,
            "Classified event"
        );
        ClassifiedEvent {
            type_name: record.type_name().to_string(),
            kind,
            priority,
            text,
            is_urgent: priority == PriorityClass::Urgent,
            raw: record.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> RawRecord {
        RawRecord::try_from(v).unwrap()
    }

    fn defaults() -> Classifier {
        Classifier::new(ClassifierConfig {
            allow_list: DEFAULT_ALLOW_LIST.iter().map(|s| s.to_string()).collect(),
            urgent: DEFAULT_URGENT.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn priority_classes_are_ordered() {
        assert!(PriorityClass::Low < PriorityClass::Normal);
        assert!(PriorityClass::High < PriorityClass::Urgent);
        assert_eq!("URGENT".parse::<PriorityClass>().unwrap(), PriorityClass::Urgent);
        assert!("panic".parse::<PriorityClass>().is_err());
        assert_eq!(PriorityClass::parse_or_default("panic"), PriorityClass::Normal);
    }

    #[test]
    fn default_priorities() {
        let c = defaults();
        assert_eq!(c.priority_of(&rec(json!({"type": "Arrival"}))), PriorityClass::High);
        assert_eq!(c.priority_of(&rec(json!({"type": "Bounty"}))), PriorityClass::Normal);
        assert_eq!(c.priority_of(&rec(json!({"type": "Docked"}))), PriorityClass::Low);
        assert_eq!(
            c.priority_of(&rec(json!({"type": "ShieldState", "shields_up": true}))),
            PriorityClass::Urgent
        );
    }

    #[tokio::test]
    async fn rejects_types_outside_allow_list() {
        let c = defaults();
        assert!(c.classify(&rec(json!({"type": "Music"}))).await.is_none());
        assert!(c.classify_silent(&rec(json!({"type": "Music"}))).is_none());
    }

    #[tokio::test]
    async fn accepted_type_without_formatter_is_generic() {
        let c = defaults();
        let ev = c.classify(&rec(json!({"type": "Synthesis"}))).await.unwrap();
        assert_eq!(ev.text, "Event detected: Synthesis.");
        assert_eq!(ev.priority, PriorityClass::Low);
    }

    #[tokio::test]
    async fn custom_urgent_set_overrides_secondary_sets() {
        let mut config = defaults().config().clone();
        config.urgent.insert("Scan".into());
        let c = Classifier::new(config);
        let ev = c
            .classify(&rec(json!({"type": "Scan", "body_name": "Earth"})))
            .await
            .unwrap();
        assert!(ev.is_urgent);
        assert_eq!(ev.priority, PriorityClass::Urgent);
        // Urgent but without canned lines.
        assert_eq!(c.canned_response(&ev), None);
    }

    #[test]
    fn canned_response_only_for_urgent_events() {
        let c = defaults();
        let ev = c.classify_silent(&rec(json!({"type": "FuelCritical"}))).unwrap();
        assert!(c.canned_response(&ev).is_some());
        let ev = c.classify_silent(&rec(json!({"type": "FuelFull"}))).unwrap();
        assert_eq!(c.canned_response(&ev), None);
    }
}
