//! Session state tracking.
//!
//! [`StateTracker`] owns the single long-lived [`SessionState`] behind one
//! lock. Every record (live or replayed) goes through [`StateTracker::update`];
//! readers get rendered text or a cloned snapshot and never hold the lock
//! across anything slow.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use tracing::debug;

use crate::record::{EventKind, RawRecord};

/// Maximum number of records kept in the recent sequence.
pub const RECENT_CAPACITY: usize = 10;

/// Text rendered when nothing is known about the session yet.
pub const EMPTY_CONTEXT: &str = "No game state available yet.";

const DEFAULT_FUEL_CAPACITY: f64 = 32.0;

/// Movement mode. Being one enum keeps the modes mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Movement {
    #[default]
    Unknown,
    Supercruise,
    NormalSpace,
}

/// One entry of the recent-record sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentRecord {
    pub type_name: String,
    pub timestamp: String,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    // Location
    pub current_system: String,
    pub current_body: String,
    pub current_station: Option<String>,
    pub docked: bool,
    pub movement: Movement,

    // Ship
    pub ship_name: String,
    pub ship_type: String,
    pub fuel_level: f64,
    pub fuel_capacity: f64,
    /// Set once a record has reported fuel.
    pub fuel_known: bool,
    pub shields_up: bool,
    pub hull_health: f64,

    // Cargo and materials
    pub cargo_capacity: u32,
    pub cargo_used: u32,
    pub materials: HashMap<String, u32>,

    // Session counters
    pub jumps: u32,
    pub bounties: u32,
    pub materials_collected: u32,
    pub last_docked: Option<String>,

    pub recent: VecDeque<RecentRecord>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            current_system: String::new(),
            current_body: String::new(),
            current_station: None,
            docked: false,
            movement: Movement::Unknown,
            ship_name: String::new(),
            ship_type: String::new(),
            fuel_level: DEFAULT_FUEL_CAPACITY,
            fuel_capacity: DEFAULT_FUEL_CAPACITY,
            fuel_known: false,
            shields_up: true,
            hull_health: 100.0,
            cargo_capacity: 0,
            cargo_used: 0,
            materials: HashMap::new(),
            jumps: 0,
            bounties: 0,
            materials_collected: 0,
            last_docked: None,
            recent: VecDeque::with_capacity(RECENT_CAPACITY + 1),
        }
    }
}

impl SessionState {
    /// Apply one record: remember it, then mutate the fields its kind owns.
    pub fn apply(&mut self, record: &RawRecord) {
        let kind = record.kind();
        self.recent.push_back(RecentRecord {
            type_name: record.type_name().to_string(),
            timestamp: record.timestamp().to_string(),
            kind: kind.clone(),
        });
        while self.recent.len() > RECENT_CAPACITY {
            self.recent.pop_front();
        }

        match kind {
            EventKind::SessionStart {
                ship,
                ship_name,
                system,
                fuel_level,
                fuel_capacity,
                ..
            } => {
                self.current_system = system.unwrap_or_default();
                self.ship_name = ship_name.unwrap_or_default();
                self.ship_type = ship.unwrap_or_default();
                if let Some(capacity) = fuel_capacity {
                    self.fuel_capacity = capacity.max(0.0);
                    self.fuel_known = true;
                }
                if let Some(level) = fuel_level {
                    self.fuel_level = level;
                    self.fuel_known = true;
                }
            }
            EventKind::Arrival { system, body } => {
                self.current_system = system.unwrap_or_default();
                self.current_body = body.unwrap_or_default();
                self.movement = Movement::NormalSpace;
                self.docked = false;
                self.jumps = self.jumps.saturating_add(1);
            }
            EventKind::SupercruiseEntry { .. } => self.movement = Movement::Supercruise,
            EventKind::SupercruiseExit { .. } => self.movement = Movement::NormalSpace,
            EventKind::Docked { station } => {
                let station = station.unwrap_or_default();
                self.last_docked = Some(station.clone());
                self.current_station = Some(station);
                self.docked = true;
                self.movement = Movement::NormalSpace;
            }
            EventKind::Undocked { .. } => {
                self.docked = false;
                self.current_station = None;
            }
            EventKind::Refuel { amount } => {
                self.fuel_level += amount.unwrap_or(0.0);
                self.fuel_known = true;
            }
            EventKind::ShieldState { shields_up } => {
                self.shields_up = shields_up.unwrap_or(true);
            }
            EventKind::HullDamage { health } => {
                if let Some(health) = health {
                    self.hull_health = health;
                }
            }
            EventKind::Bounty { .. } => self.bounties = self.bounties.saturating_add(1),
            EventKind::MaterialCollected { name, count } => {
                let held = self.materials.entry(name.unwrap_or_default()).or_insert(0);
                *held = held.saturating_add(count.unwrap_or(1));
                self.materials_collected = self.materials_collected.saturating_add(1);
            }
            EventKind::Cargo { capacity, count } => {
                if let Some(capacity) = capacity {
                    self.cargo_capacity = capacity;
                }
                if let Some(count) = count {
                    self.cargo_used = count;
                }
            }
            _ => {}
        }
        self.fuel_level = self.fuel_level.clamp(0.0, self.fuel_capacity);
    }

    /// Fuel level as a fraction of capacity, 0.0 when capacity is unknown.
    pub fn fuel_fraction(&self) -> f64 {
        if self.fuel_capacity > 0.0 {
            self.fuel_level / self.fuel_capacity
        } else {
            0.0
        }
    }

    /// Ordered, deterministic summary of the session.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();

        if !self.current_system.is_empty() {
            let mut location = format!("Currently in {}", self.current_system);
            if let Some(station) = self.current_station.as_deref().filter(|s| !s.is_empty()) {
                location.push_str(&format!(", docked at {station}"));
            } else if self.movement == Movement::Supercruise {
                location.push_str(" (in supercruise)");
            }
            parts.push(location);
        }

        if !self.ship_name.is_empty() && !self.ship_type.is_empty() {
            parts.push(format!(
                "Piloting a {} called '{}'",
                self.ship_type, self.ship_name
            ));
        }

        if self.fuel_known {
            let fuel_percent = self.fuel_fraction() * 100.0;
            if fuel_percent < 25.0 {
                parts.push(format!("Fuel is LOW: {fuel_percent:.0}%"));
            } else if fuel_percent < 50.0 {
                parts.push(format!("Fuel is {fuel_percent:.0}%"));
            } else {
                parts.push(format!("Fuel is good: {fuel_percent:.0}%"));
            }
        }

        if !self.shields_up {
            parts.push("WARNING: Shields are DOWN!".to_string());
        }
        if self.jumps > 0 {
            parts.push(format!("Session stats: {} jumps", self.jumps));
        }
        if self.bounties > 0 {
            parts.push(format!("{} bounties claimed", self.bounties));
        }

        if parts.is_empty() {
            EMPTY_CONTEXT.to_string()
        } else {
            format!("{}.", parts.join(". "))
        }
    }

    /// Short summaries of the last three records, for chat grounding.
    pub fn recent_activity(&self) -> Vec<String> {
        let skip = self.recent.len().saturating_sub(3);
        self.recent
            .iter()
            .skip(skip)
            .filter_map(|r| match &r.kind {
                EventKind::Arrival { system, .. } => Some(format!(
                    "Jumped to {}",
                    system.as_deref().unwrap_or("unknown")
                )),
                EventKind::Docked { station } => Some(format!(
                    "Docked at {}",
                    station.as_deref().unwrap_or("unknown")
                )),
                EventKind::Scan { body_name, .. } => Some(format!(
                    "Scanned {}",
                    body_name.as_deref().unwrap_or("body")
                )),
                _ => None,
            })
            .collect()
    }
}

/// Owner of the session state. Constructed once by the companion and shared
/// by reference with every component that needs it.
#[derive(Debug, Default)]
pub struct StateTracker {
    state: Mutex<SessionState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single mutation entry point.
    pub fn update(&self, record: &RawRecord) {
        let mut state = self.state.lock();
        state.apply(record);
        debug!(
            target = "state",
            event = record.type_name(),
            system = %state.current_system,
            fuel = state.fuel_level,
            shields_up = state.shields_up,
            "Session state updated"
        );
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.lock().clone()
    }

    pub fn describe_context(&self) -> String {
        self.state.lock().describe()
    }

    pub fn chat_context(&self) -> String {
        let (description, activity) = {
            let state = self.state.lock();
            (state.describe(), state.recent_activity())
        };

        let mut parts = Vec::new();
        if !description.is_empty() {
            parts.push(description);
        }
        if !activity.is_empty() {
            parts.push(format!("Recent activity: {}", activity.join(", ")));
        }
        if parts.is_empty() {
            "Starting new session.".to_string()
        } else {
            parts.join("\n\n")
        }
    }

    pub fn current_system(&self) -> String {
        self.state.lock().current_system.clone()
    }

    pub fn is_docked(&self) -> bool {
        self.state.lock().docked
    }

    /// `(level, capacity)`
    pub fn fuel_status(&self) -> (f64, f64) {
        let state = self.state.lock();
        (state.fuel_level, state.fuel_capacity)
    }

    pub fn fuel_fraction(&self) -> f64 {
        self.state.lock().fuel_fraction()
    }
}
