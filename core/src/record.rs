//! Journal records and the closed set of event kinds Starlog understands.
//!
//! A [`RawRecord`] is the opaque, ordered JSON object read from one journal
//! line. [`EventKind`] is the typed view of it: one variant per known event
//! type carrying only the fields that type uses, plus [`EventKind::Unknown`]
//! for everything else.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::{Result, StarlogError};

/// Discriminator key present on every record.
pub const TYPE_KEY: &str = "type";
/// Timestamp key present on every record.
pub const TIMESTAMP_KEY: &str = "timestamp";
/// Type name of the synthetic record emitted after bootstrap replay.
pub const STATE_LOADED: &str = "StateLoaded";

/// One structured, self-describing unit of input from the journal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    /// Parse a single journal line. Anything other than a JSON object is rejected.
    pub fn parse_line(line: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(line)?;
        Self::try_from(value)
    }

    /// The synthetic record emitted once bootstrap replay has finished.
    pub fn state_loaded() -> Self {
        let mut map = Map::new();
        map.insert(TYPE_KEY.into(), Value::String(STATE_LOADED.into()));
        map.insert(TIMESTAMP_KEY.into(), Value::String(String::new()));
        Self(map)
    }

    pub fn type_name(&self) -> &str {
        self.0.get(TYPE_KEY).and_then(Value::as_str).unwrap_or("")
    }

    pub fn timestamp(&self) -> &str {
        self.0
            .get(TIMESTAMP_KEY)
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Typed view of this record. Never fails: unknown types become
    /// [`EventKind::Unknown`] and mistyped fields read as absent.
    pub fn kind(&self) -> EventKind {
        serde_json::from_value::<EventKind>(Value::Object(self.0.clone())).unwrap_or_else(|_| {
            EventKind::Unknown {
                type_name: self.type_name().to_string(),
            }
        })
    }
}

impl TryFrom<Value> for RawRecord {
    type Error = StarlogError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(StarlogError::JournalError(format!(
                "record is not a JSON object: {other}"
            ))),
        }
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Accept a field only if it has the expected shape; anything else reads as
/// absent so one bad value does not sink the whole record.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Known journal event kinds.
///
/// Field names follow the journal's snake_case keys. Every field is optional;
/// formatters and the state tracker supply defaults for missing or mistyped
/// ones.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    SessionStart {
        #[serde(default, deserialize_with = "lenient")]
        commander: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        ship: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        ship_name: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        system: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        fuel_level: Option<f64>,
        #[serde(default, deserialize_with = "lenient")]
        fuel_capacity: Option<f64>,
    },
    Arrival {
        #[serde(default, deserialize_with = "lenient")]
        system: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        body: Option<String>,
    },
    StartJump {
        #[serde(default, deserialize_with = "lenient")]
        system: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        jump_type: Option<String>,
    },
    SupercruiseEntry {
        #[serde(default, deserialize_with = "lenient")]
        system: Option<String>,
    },
    SupercruiseExit {
        #[serde(default, deserialize_with = "lenient")]
        body: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        body_type: Option<String>,
    },
    DockingRequested {
        #[serde(default, deserialize_with = "lenient")]
        station: Option<String>,
    },
    DockingGranted {
        #[serde(default, deserialize_with = "lenient")]
        station: Option<String>,
    },
    DockingDenied {
        #[serde(default, deserialize_with = "lenient")]
        station: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        reason: Option<String>,
    },
    DockingCancelled {
        #[serde(default, deserialize_with = "lenient")]
        station: Option<String>,
    },
    Docked {
        #[serde(default, deserialize_with = "lenient")]
        station: Option<String>,
    },
    Undocked {
        #[serde(default, deserialize_with = "lenient")]
        station: Option<String>,
    },
    Refuel {
        #[serde(default, deserialize_with = "lenient")]
        amount: Option<f64>,
    },
    FuelFull {},
    FuelCritical {},
    ShieldState {
        #[serde(default, deserialize_with = "lenient")]
        shields_up: Option<bool>,
    },
    HullDamage {
        #[serde(default, deserialize_with = "lenient")]
        health: Option<f64>,
    },
    Destroyed {},
    Resurrect {},
    UnderAttack {},
    Interdicted {},
    Bounty {
        #[serde(default, deserialize_with = "lenient")]
        target: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        reward: Option<u64>,
    },
    MaterialCollected {
        #[serde(default, deserialize_with = "lenient")]
        name: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        count: Option<u32>,
    },
    MaterialDiscarded {
        #[serde(default, deserialize_with = "lenient")]
        name: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        count: Option<u32>,
    },
    Scan {
        #[serde(default, deserialize_with = "lenient")]
        body_name: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        body_type: Option<String>,
    },
    SignalsFound {
        #[serde(default, deserialize_with = "lenient")]
        body_name: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        count: Option<u32>,
    },
    Cargo {
        #[serde(default, deserialize_with = "lenient")]
        capacity: Option<u32>,
        #[serde(default, deserialize_with = "lenient")]
        count: Option<u32>,
    },
    MissionAccepted {
        #[serde(default, deserialize_with = "lenient")]
        name: Option<String>,
    },
    MissionCompleted {
        #[serde(default, deserialize_with = "lenient")]
        name: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        reward: Option<u64>,
    },
    MissionFailed {
        #[serde(default, deserialize_with = "lenient")]
        name: Option<String>,
    },
    StateLoaded {},
    #[serde(skip)]
    Unknown { type_name: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_kind_with_missing_fields() {
        let rec = RawRecord::parse_line(r#"{"type":"Arrival","system":"Sol"}"#).unwrap();
        assert_eq!(
            rec.kind(),
            EventKind::Arrival {
                system: Some("Sol".into()),
                body: None
            }
        );
    }

    #[test]
    fn unknown_type_keeps_its_name() {
        let rec = RawRecord::try_from(json!({"type": "Music", "track": "Combat"})).unwrap();
        assert_eq!(
            rec.kind(),
            EventKind::Unknown {
                type_name: "Music".into()
            }
        );
    }

    #[test]
    fn mistyped_field_reads_as_absent() {
        let rec = RawRecord::try_from(json!({"type": "Bounty", "reward": -50, "target": "Pirate"}))
            .unwrap();
        assert_eq!(
            rec.kind(),
            EventKind::Bounty {
                target: Some("Pirate".into()),
                reward: None
            }
        );

        let rec = RawRecord::try_from(json!({"type": "MaterialCollected", "name": "iron", "count": 2.5}))
            .unwrap();
        assert_eq!(
            rec.kind(),
            EventKind::MaterialCollected {
                name: Some("iron".into()),
                count: None
            }
        );
    }

    #[test]
    fn explicit_null_reads_as_absent() {
        let rec = RawRecord::try_from(json!({"type": "Docked", "station": null})).unwrap();
        assert_eq!(rec.kind(), EventKind::Docked { station: None });
    }

    #[test]
    fn unit_like_kinds_ignore_extra_fields() {
        let rec = RawRecord::try_from(json!({"type": "FuelCritical", "timestamp": "t"})).unwrap();
        assert_eq!(rec.kind(), EventKind::FuelCritical {});
    }

    #[test]
    fn rejects_non_object_lines() {
        assert!(RawRecord::parse_line("[1,2,3]").is_err());
        assert!(RawRecord::parse_line("{not json").is_err());
    }

    #[test]
    fn state_loaded_record_is_typed() {
        let rec = RawRecord::state_loaded();
        assert_eq!(rec.type_name(), STATE_LOADED);
        assert_eq!(rec.kind(), EventKind::StateLoaded {});
    }
}
