//! Per-kind sentence formatters.

use crate::record::EventKind;

fn or<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
    value.as_deref().filter(|s| !s.is_empty()).unwrap_or(default)
}

/// Render one event as a sentence.
///
/// `enrichment` is the looked-up system description, only used for arrivals.
/// Missing fields fall back to human-readable defaults; unknown kinds get a
/// generic sentence.
pub fn format(kind: &EventKind, enrichment: Option<&str>) -> String {
    match kind {
        EventKind::SessionStart {
            commander, ship, ..
        } => format!(
            "Welcome back, Commander {}. Systems online. Aboard the {}.",
            or(commander, "Commander"),
            or(ship, "Unknown Ship")
        ),
        EventKind::Arrival { system, body } => {
            let mut parts = vec![format!("Arrived in {}", or(system, "Unknown System"))];
            if let Some(description) = enrichment.filter(|d| !d.is_empty()) {
                parts.push(description.to_string());
            }
            if let Some(body) = body.as_deref().filter(|b| !b.is_empty()) {
                parts.push(format!("Near {body}"));
            }
            format!("{}.", parts.join(". "))
        }
        EventKind::StartJump { system, jump_type } => format!(
            "Initiating {} jump to {}.",
            or(jump_type, "Hyperspace"),
            or(system, "Unknown System")
        ),
        EventKind::SupercruiseEntry { system } => {
            format!("Entering supercruise in {}.", or(system, "Unknown System"))
        }
        EventKind::SupercruiseExit { body, body_type } => match body.as_deref() {
            Some(body) if !body.is_empty() => format!(
                "Dropping from supercruise near {body} ({}).",
                or(body_type, "Unknown")
            ),
            _ => format!(
                "Dropping from supercruise near {}.",
                or(body_type, "Unknown")
            ),
        },
        EventKind::DockingRequested { station } => {
            format!("Docking requested at {}.", or(station, "Unknown Station"))
        }
        EventKind::DockingGranted { station } => {
            format!("Docking granted at {}.", or(station, "Unknown Station"))
        }
        EventKind::DockingDenied { station, reason } => format!(
            "Docking denied at {}. Reason: {}.",
            or(station, "Unknown Station"),
            or(reason, "No reason given")
        ),
        EventKind::DockingCancelled { station } => format!(
            "Docking request cancelled at {}.",
            or(station, "Unknown Station")
        ),
        EventKind::Docked { station } => {
            format!("Docked at {}.", or(station, "Unknown Station"))
        }
        EventKind::Undocked { station } => {
            format!("Undocked from {}.", or(station, "Unknown Station"))
        }
        EventKind::Refuel { amount } => match amount {
            Some(amount) => format!("Refuelled {amount:.1} tons."),
            None => "Refuelling complete.".to_string(),
        },
        EventKind::FuelFull {} => "Fuel tanks are now full.".to_string(),
        EventKind::FuelCritical {} => "CRITICAL: Ship fuel is critically low!".to_string(),
        EventKind::ShieldState { shields_up } => {
            if shields_up.unwrap_or(true) {
                "Shields are back online.".to_string()
            } else {
                "WARNING: Shields have gone down!".to_string()
            }
        }
        EventKind::HullDamage { health } => match health {
            Some(health) => format!("Hull damage sustained. Integrity at {health:.0}%."),
            None => "Hull damage sustained.".to_string(),
        },
        EventKind::Destroyed {} => {
            "ALERT: Ship has been destroyed. Commander, you have died.".to_string()
        }
        EventKind::Resurrect {} => "Ship systems restored. Welcome back, Commander.".to_string(),
        EventKind::UnderAttack {} => "WARNING: Ship is under attack!".to_string(),
        EventKind::Interdicted {} => "WARNING: Ship has been interdicted!".to_string(),
        EventKind::Bounty { target, reward } => format!(
            "Bounty claimed: {} credits for {}.",
            reward.unwrap_or(0),
            or(target, "Unknown")
        ),
        EventKind::MaterialCollected { name, .. } => {
            format!("Material collected: {}.", or(name, "Unknown Material"))
        }
        EventKind::MaterialDiscarded { name, .. } => {
            format!("Material discarded: {}.", or(name, "Unknown Material"))
        }
        EventKind::Scan {
            body_name,
            body_type,
        } => format!(
            "Scan complete: {} ({}).",
            or(body_name, "Unknown"),
            or(body_type, "Unknown")
        ),
        EventKind::SignalsFound { body_name, count } => format!(
            "{} signals detected on {}.",
            count.unwrap_or(0),
            or(body_name, "Unknown")
        ),
        EventKind::Cargo { capacity, count } => match capacity {
            Some(capacity) => format!("Cargo hold at {}/{capacity} tons.", count.unwrap_or(0)),
            None => format!("Cargo hold holds {} tons.", count.unwrap_or(0)),
        },
        EventKind::MissionAccepted { name } => {
            format!("Mission accepted: {}.", or(name, "Unknown Mission"))
        }
        EventKind::MissionCompleted { name, reward } => match reward {
            Some(reward) => format!(
                "Mission completed: {}. Reward: {reward} credits.",
                or(name, "Unknown Mission")
            ),
            None => format!("Mission completed: {}.", or(name, "Unknown Mission")),
        },
        EventKind::MissionFailed { name } => {
            format!("Mission failed: {}.", or(name, "Unknown Mission"))
        }
        EventKind::StateLoaded {} => "Game state loaded.".to_string(),
        EventKind::Unknown { type_name } => format!("Event detected: {type_name}."),
    }
}
