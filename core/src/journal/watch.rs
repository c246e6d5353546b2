//! Filesystem watch thread for the journal directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{is_journal_file, Tailer};
use crate::Result;

/// Keeps a `notify` watcher alive on the journal directory and drives the
/// shared [`Tailer`] from its callbacks. Dropping it stops the watch.
pub struct JournalWatcher {
    dir: PathBuf,
    _watcher: RecommendedWatcher,
}

impl JournalWatcher {
    pub fn start(dir: &Path, tailer: Arc<Mutex<Tailer>>) -> Result<Self> {
        let mut watcher =
            notify::recommended_watcher(move |res: std::result::Result<notify::Event, notify::Error>| {
                let event = match res {
                    Ok(event) => event,
                    Err(err) => {
                        debug!(target = "watch", error = %err, "Journal watcher error");
                        read_appended(&tailer);
                        return;
                    }
                };

                if matches!(event.kind, notify::EventKind::Access(_)) {
                    return;
                }

                // Backends may report without paths; reading is cheap either way.
                let journal_paths: Vec<_> = event
                    .paths
                    .iter()
                    .filter(|p| is_journal_file(p))
                    .collect();
                if event.paths.is_empty() || matches!(event.kind, notify::EventKind::Other) {
                    read_appended(&tailer);
                    return;
                }
                if journal_paths.is_empty() {
                    return;
                }

                let mut tailer = tailer.lock();
                let foreign = journal_paths
                    .iter()
                    .any(|p| tailer.current_file() != Some(p.as_path()));
                if foreign {
                    if let Err(e) = tailer.poll_for_rotation() {
                        warn!(target = "watch", error = %e, "Rotation check failed");
                    }
                }
                if let Err(e) = tailer.on_file_changed() {
                    warn!(target = "watch", error = %e, "Failed to read journal");
                }
            })?;

        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!(target = "watch", dir = %dir.display(), "Watching journal directory");

        Ok(Self {
            dir: dir.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn read_appended(tailer: &Mutex<Tailer>) {
    if let Err(e) = tailer.lock().on_file_changed() {
        warn!(target = "watch", error = %e, "Failed to read journal");
    }
}
