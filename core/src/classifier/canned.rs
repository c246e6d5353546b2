//! Pre-written lines spoken for urgent events instead of generated text.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::record::EventKind;

const CANNED: &[(&str, &[&str])] = &[
    (
        "FuelCritical",
        &[
            "Fuel critical! Find a refuel immediately!",
            "Warning! Fuel reserves depleted!",
        ],
    ),
    (
        "Destroyed",
        &[
            "Ship destroyed. Reinitiating systems...",
            "Critical failure. Ship destroyed.",
        ],
    ),
    (
        "ShieldState",
        &[
            "Shields down! Evasive action recommended!",
            "Shield failure detected!",
        ],
    ),
];

/// Rotates round-robin through the canned lines of each urgent kind.
#[derive(Debug)]
pub struct CannedResponses {
    cursors: Vec<AtomicUsize>,
}

impl Default for CannedResponses {
    fn default() -> Self {
        Self {
            cursors: CANNED.iter().map(|_| AtomicUsize::new(0)).collect(),
        }
    }
}

impl CannedResponses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next canned line for `kind`, if it has any.
    ///
    /// Shields coming back up is not an emergency and gets none.
    pub fn next(&self, kind: &EventKind) -> Option<&'static str> {
        let type_name = match kind {
            EventKind::FuelCritical {} => "FuelCritical",
            EventKind::Destroyed {} => "Destroyed",
            EventKind::ShieldState { shields_up } if !shields_up.unwrap_or(true) => "ShieldState",
            _ => return None,
        };
        let index = CANNED.iter().position(|(name, _)| *name == type_name)?;
        let lines = CANNED[index].1;
        let n = self.cursors[index].fetch_add(1, Ordering::Relaxed);
        Some(lines[n % lines.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_round_robin() {
        let canned = CannedResponses::new();
        let kind = EventKind::FuelCritical {};
        assert_eq!(canned.next(&kind), Some("Fuel critical! Find a refuel immediately!"));
        assert_eq!(canned.next(&kind), Some("Warning! Fuel reserves depleted!"));
        assert_eq!(canned.next(&kind), Some("Fuel critical! Find a refuel immediately!"));
        // Kinds rotate independently.
        assert_eq!(
            canned.next(&EventKind::Destroyed {}),
            Some("Ship destroyed. Reinitiating systems...")
        );
    }

    #[test]
    fn only_shield_loss_is_canned() {
        let canned = CannedResponses::new();
        assert_eq!(canned.next(&EventKind::ShieldState { shields_up: Some(true) }), None);
        assert_eq!(
            canned.next(&EventKind::ShieldState { shields_up: Some(false) }),
            Some("Shields down! Evasive action recommended!")
        );
        assert_eq!(canned.next(&EventKind::Bounty { target: None, reward: None }), None);
    }
}
