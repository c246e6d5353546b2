//! Session state built from replayed journal records

use serde_json::json;
use starlog_core::journal::bootstrap::collect_replay;
use starlog_core::state::{Movement, SessionState};
use starlog_core::{RawRecord, StateTracker};

fn records(values: Vec<serde_json::Value>) -> Vec<RawRecord> {
    values
        .into_iter()
        .map(|v| RawRecord::try_from(v).unwrap())
        .collect()
}

fn journal() -> Vec<RawRecord> {
    records(vec![
        json!({"type": "SessionStart", "system": "Lave", "ship": "Sidewinder", "ship_name": "Old Faithful"}),
        json!({"type": "Bounty", "reward": 50}),
        json!({"type": "SessionStart", "commander": "Jameson", "system": "Sol",
               "ship": "Cobra MkIII", "ship_name": "Starlight", "fuel_level": 8.0, "fuel_capacity": 16.0}),
        json!({"type": "Arrival", "system": "Alpha Centauri", "body": "Hutton Orbital"}),
        json!({"type": "SupercruiseEntry", "system": "Alpha Centauri"}),
        json!({"type": "ShieldState", "shields_up": false}),
        json!({"type": "Cargo", "capacity": 32, "count": 4}),
        json!({"type": "Music", "track": "Combat"}),
    ])
}

/// Everything except the monotonic counters and the recent sequence.
fn location_and_vitals(s: &SessionState) -> impl PartialEq + std::fmt::Debug {
    (
        s.current_system.clone(),
        s.current_body.clone(),
        s.current_station.clone(),
        s.docked,
        s.movement,
        s.ship_name.clone(),
        s.ship_type.clone(),
        s.fuel_level.to_bits(),
        s.fuel_capacity.to_bits(),
        s.shields_up,
        s.cargo_capacity,
        s.cargo_used,
    )
}

#[test]
fn replay_selects_latest_session() {
    let replay = collect_replay(&journal());
    let types: Vec<_> = replay.iter().map(|r| r.type_name().to_string()).collect();
    assert_eq!(
        types,
        ["SessionStart", "Arrival", "SupercruiseEntry", "ShieldState", "Cargo"]
    );
}

#[test]
fn replaying_twice_only_moves_counters() {
    let replay = collect_replay(&journal());

    let once = StateTracker::new();
    replay.iter().for_each(|r| once.update(r));
    let twice = StateTracker::new();
    replay.iter().chain(replay.iter()).for_each(|r| twice.update(r));

    let (a, b) = (once.snapshot(), twice.snapshot());
    assert_eq!(location_and_vitals(&a), location_and_vitals(&b));
    assert_eq!(a.jumps, 1);
    assert_eq!(b.jumps, 2);

    assert_eq!(a.current_system, "Alpha Centauri");
    assert_eq!(a.movement, Movement::Supercruise);
    assert!(!a.shields_up);
    assert_eq!(once.fuel_status(), (8.0, 16.0));
}

#[test]
fn description_is_ordered() {
    let tracker = StateTracker::new();
    collect_replay(&journal()).iter().for_each(|r| tracker.update(r));

    assert_eq!(
        tracker.describe_context(),
        "Currently in Alpha Centauri (in supercruise). \
         Piloting a Cobra MkIII called 'Starlight'. \
         Fuel is good: 50%. \
         WARNING: Shields are DOWN!. \
         Session stats: 1 jumps."
    );
    // The three most recent records have no activity summary.
    assert_eq!(tracker.chat_context(), tracker.describe_context());

    tracker.update(&RawRecord::try_from(json!({"type": "Scan", "body_name": "Proxima b"})).unwrap());
    assert!(tracker
        .chat_context()
        .ends_with("\n\nRecent activity: Scanned Proxima b"));
}

#[test]
fn docking_and_refuel() {
    let tracker = StateTracker::new();
    for r in records(vec![
        json!({"type": "SessionStart", "system": "Sol", "fuel_level": 2.0, "fuel_capacity": 16.0}),
        json!({"type": "Docked", "station": "Galileo"}),
        json!({"type": "Refuel", "amount": 100.0}),
    ]) {
        tracker.update(&r);
    }
    assert!(tracker.is_docked());
    assert_eq!(tracker.fuel_fraction(), 1.0);
    assert!(tracker.describe_context().starts_with("Currently in Sol, docked at Galileo."));

    tracker.update(&RawRecord::try_from(json!({"type": "Undocked"})).unwrap());
    assert!(!tracker.is_docked());
    assert_eq!(tracker.snapshot().last_docked.as_deref(), Some("Galileo"));
}
