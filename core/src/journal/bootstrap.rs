//! Bootstrap replay: rebuild session state from the journal that is already
//! on disk before live tailing begins.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use super::{RecordCallback, TailedRecord};
use crate::record::RawRecord;
use crate::Result;

/// Record types that carry session state worth replaying.
pub const STATE_RELEVANT: &[&str] = &[
    "SessionStart",
    "Arrival",
    "Docked",
    "Undocked",
    "SupercruiseEntry",
    "SupercruiseExit",
    "Refuel",
    "ShieldState",
    "Cargo",
];

const SESSION_START: &str = "SessionStart";

pub fn is_state_relevant(type_name: &str) -> bool {
    STATE_RELEVANT.contains(&type_name)
}

/// Pick the records to replay from a journal's complete records, oldest first.
///
/// Walks backward collecting state-relevant records and stops at the most
/// recent `SessionStart`, which is included.
pub fn collect_replay(records: &[RawRecord]) -> Vec<RawRecord> {
    let mut collected = Vec::new();
    for record in records.iter().rev() {
        if !is_state_relevant(record.type_name()) {
            continue;
        }
        collected.push(record.clone());
        if record.type_name() == SESSION_START {
            break;
        }
    }
    collected.reverse();
    collected
}

/// Replay `path` through `callback` and return the byte offset just past the
/// last complete line read.
///
/// Replayed records are delivered silent, followed by one synthetic
/// `StateLoaded` record that is not.
pub fn replay(path: &Path, callback: &mut RecordCallback) -> Result<u64> {
    let bytes = fs::read(path)?;
    let complete_len = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);

    let records: Vec<RawRecord> = bytes[..complete_len]
        .split(|b| *b == b'\n')
        .filter_map(|line| {
            let line = String::from_utf8_lossy(line);
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            RawRecord::parse_line(line)
                .map_err(|e| debug!(target = "bootstrap", error = %e, "Skipping malformed journal line"))
                .ok()
        })
        .collect();

    let replayed = collect_replay(&records);
    info!(
        target = "bootstrap",
        file = %path.display(),
        scanned = records.len(),
        replayed = replayed.len(),
        "Replaying journal state"
    );

    for record in replayed {
        callback(TailedRecord::silent(record));
    }
    callback(TailedRecord::live(RawRecord::state_loaded()));

    Ok(complete_len as u64)
}
