//! Journal tailing.
//!
//! The [`Tailer`] follows the newest `Journal.*.log` file in a directory,
//! keeps a byte cursor into it and hands every complete, well-formed line
//! appended since the last read to a record callback. The callback runs on
//! whatever thread drives the tailer (the filesystem watch thread in
//! production) and is expected to enqueue only.

pub mod bootstrap;
pub mod watch;

pub use watch::JournalWatcher;

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::record::RawRecord;
use crate::Result;

/// Journal file names look like `Journal.<stamp>.log`.
pub const JOURNAL_PREFIX: &str = "Journal.";
pub const JOURNAL_SUFFIX: &str = ".log";

/// A record delivered by the tailer.
#[derive(Debug, Clone, PartialEq)]
pub struct TailedRecord {
    pub record: RawRecord,
    /// Set for records replayed during bootstrap: update state, do not narrate.
    pub silent: bool,
}

impl TailedRecord {
    pub fn live(record: RawRecord) -> Self {
        Self {
            record,
            silent: false,
        }
    }

    pub fn silent(record: RawRecord) -> Self {
        Self {
            record,
            silent: true,
        }
    }
}

/// Receives records in file order.
pub type RecordCallback = Box<dyn FnMut(TailedRecord) + Send>;

/// Position of the tailer inside the attached file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailerCursor {
    pub path: PathBuf,
    pub offset: u64,
}

/// Journal directory settings
#[derive(Clone, Debug)]
pub struct JournalConfig {
    pub dir: PathBuf,
    /// Replay recent state-relevant records on the first attach
    pub bootstrap: bool,
    /// How often to look for a newer journal file
    pub rotation_poll_ms: u64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        let dir = std::env::var("STARLOG_JOURNAL_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_journal_dir);
        let bootstrap = std::env::var("STARLOG_BOOTSTRAP")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(true);
        let rotation_poll_ms = std::env::var("STARLOG_ROTATION_POLL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5_000);
        Self {
            dir,
            bootstrap,
            rotation_poll_ms,
        }
    }
}

fn default_journal_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Saved Games")
        .join("Frontier Developments")
        .join("Elite Dangerous")
}

/// True for file names of the form `Journal.*.log`.
pub fn is_journal_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| {
            n.len() > JOURNAL_PREFIX.len() + JOURNAL_SUFFIX.len()
                && n.starts_with(JOURNAL_PREFIX)
                && n.ends_with(JOURNAL_SUFFIX)
        })
        .unwrap_or(false)
}

/// Pick the journal file with the newest modification time.
///
/// Ties are broken by the lexically greatest file name. A missing directory
/// or an empty one yields `None`.
pub fn select_latest(dir: &Path) -> Option<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(target = "journal", dir = %dir.display(), error = %e, "Journal directory not readable");
            return None;
        }
    };

    let latest = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_journal_file(path))
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .max_by(|(ta, pa), (tb, pb)| ta.cmp(tb).then_with(|| pa.file_name().cmp(&pb.file_name())))
        .map(|(_, path)| path);

    if latest.is_none() {
        info!(target = "journal", dir = %dir.display(), "No journal files found");
    }
    latest
}

/// Follows the newest journal file in one directory.
pub struct Tailer {
    dir: PathBuf,
    cursor: Option<TailerCursor>,
    bootstrap_on_first_attach: bool,
    callback: RecordCallback,
}

impl Tailer {
    pub fn new(dir: impl Into<PathBuf>, callback: RecordCallback) -> Self {
        Self {
            dir: dir.into(),
            cursor: None,
            bootstrap_on_first_attach: true,
            callback,
        }
    }

    /// Whether the first attach made by [`Tailer::poll_for_rotation`] replays state.
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap_on_first_attach = bootstrap;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cursor(&self) -> Option<&TailerCursor> {
        self.cursor.as_ref()
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.cursor.as_ref().map(|c| c.path.as_path())
    }

    pub fn select_latest(&self) -> Option<PathBuf> {
        select_latest(&self.dir)
    }

    /// Attach to `path`. With `bootstrap`, replay recent state first and
    /// start reading right after the replayed bytes; otherwise start at the
    /// current end of file.
    pub fn attach(&mut self, path: &Path, bootstrap: bool) -> Result<()> {
        let offset = if bootstrap {
            bootstrap::replay(path, &mut self.callback)?
        } else {
            fs::metadata(path)?.len()
        };
        info!(target = "journal", file = %path.display(), offset, bootstrap, "Attached to journal");
        self.cursor = Some(TailerCursor {
            path: path.to_path_buf(),
            offset,
        });
        Ok(())
    }

    /// Deliver every complete line appended since the last read.
    ///
    /// Returns the number of records handed to the callback. Lines that do
    /// not parse are skipped, but the cursor still moves past them.
    pub fn on_file_changed(&mut self) -> Result<usize> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(0);
        };

        let mut file = File::open(&cursor.path)?;
        let len = file.metadata()?.len();
        if len < cursor.offset {
            warn!(
                target = "journal",
                file = %cursor.path.display(),
                len,
                offset = cursor.offset,
                "Journal shrank; treating as rotation"
            );
            cursor.offset = 0;
        }
        if len == cursor.offset {
            return Ok(0);
        }

        file.seek(SeekFrom::Start(cursor.offset))?;
        let mut buf = Vec::with_capacity((len - cursor.offset) as usize);
        file.read_to_end(&mut buf)?;

        // Only consume up to the last newline; a partial line waits for the next read.
        let Some(last_newline) = buf.iter().rposition(|b| *b == b'\n') else {
            return Ok(0);
        };
        let complete = &buf[..=last_newline];

        let mut delivered = 0;
        for line in complete.split(|b| *b == b'\n') {
            let line = String::from_utf8_lossy(line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match RawRecord::parse_line(line) {
                Ok(record) => {
                    (self.callback)(TailedRecord::live(record));
                    delivered += 1;
                }
                Err(e) => {
                    debug!(target = "journal", error = %e, "Skipping malformed journal line");
                }
            }
        }
        cursor.offset += complete.len() as u64;
        Ok(delivered)
    }

    /// Re-target to a newer journal file if one appeared.
    ///
    /// Returns true when the tailer switched (or attached for the first time).
    pub fn poll_for_rotation(&mut self) -> Result<bool> {
        let Some(latest) = self.select_latest() else {
            return Ok(false);
        };
        match self.current_file() {
            Some(current) if current == latest => Ok(false),
            Some(current) => {
                info!(
                    target = "journal",
                    from = %current.display(),
                    to = %latest.display(),
                    "Switching to new journal"
                );
                self.attach(&latest, false)?;
                Ok(true)
            }
            None => {
                let bootstrap = self.bootstrap_on_first_attach;
                self.attach(&latest, bootstrap)?;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn collecting_tailer(dir: &Path) -> (Tailer, Arc<Mutex<Vec<TailedRecord>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let tailer = Tailer::new(
            dir,
            Box::new(move |r| sink.lock().unwrap().push(r)),
        );
        (tailer, seen)
    }

    fn append(path: &Path, text: &str) {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    fn set_mtime(path: &Path, secs: u64) {
        let f = fs::OpenOptions::new().write(true).open(path).unwrap();
        f.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn journal_name_pattern() {
        assert!(is_journal_file(Path::new("/x/Journal.2024-01-01T000000.01.log")));
        assert!(!is_journal_file(Path::new("/x/Journal..log")));
        assert!(!is_journal_file(Path::new("/x/Status.json")));
        assert!(!is_journal_file(Path::new("/x/Journal.1.txt")));
    }

    #[test]
    fn select_latest_prefers_newest_mtime() {
        let dir = tempfile::tempdir().unwrap();
        for (name, secs) in [("Journal.a.log", 100), ("Journal.b.log", 300), ("Journal.c.log", 200)] {
            let p = dir.path().join(name);
            append(&p, "{}\n");
            set_mtime(&p, secs);
        }
        append(&dir.path().join("Other.log"), "{}\n");
        assert_eq!(select_latest(dir.path()), Some(dir.path().join("Journal.b.log")));
    }

    #[test]
    fn select_latest_breaks_ties_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["Journal.b.log", "Journal.c.log", "Journal.a.log"] {
            let p = dir.path().join(name);
            append(&p, "{}\n");
            set_mtime(&p, 500);
        }
        assert_eq!(select_latest(dir.path()), Some(dir.path().join("Journal.c.log")));
    }

    #[test]
    fn select_latest_missing_dir_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(select_latest(&dir.path().join("nope")), None);
        assert_eq!(select_latest(dir.path()), None);
    }

    #[test]
    fn attach_without_bootstrap_skips_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Journal.1.log");
        append(&path, "{\"type\":\"Arrival\",\"system\":\"Sol\"}\n");

        let (mut tailer, seen) = collecting_tailer(dir.path());
        tailer.attach(&path, false).unwrap();
        assert_eq!(tailer.on_file_changed().unwrap(), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn second_read_without_new_bytes_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Journal.1.log");
        append(&path, "");

        let (mut tailer, seen) = collecting_tailer(dir.path());
        tailer.attach(&path, false).unwrap();
        append(&path, "{\"type\":\"Scan\"}\n{\"type\":\"Bounty\"}\n");

        assert_eq!(tailer.on_file_changed().unwrap(), 2);
        let offset = tailer.cursor().unwrap().offset;
        assert_eq!(tailer.on_file_changed().unwrap(), 0);
        assert_eq!(tailer.cursor().unwrap().offset, offset);

        let types: Vec<_> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.record.type_name().to_string())
            .collect();
        assert_eq!(types, vec!["Scan", "Bounty"]);
    }

    #[test]
    fn malformed_lines_are_skipped_and_passed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Journal.1.log");
        append(&path, "");

        let (mut tailer, seen) = collecting_tailer(dir.path());
        tailer.attach(&path, false).unwrap();
        let body = "{\"type\":\"Scan\"}\nnot json at all\n\n{\"type\":\"Docked\"}\n";
        append(&path, body);

        assert_eq!(tailer.on_file_changed().unwrap(), 2);
        assert_eq!(tailer.cursor().unwrap().offset, body.len() as u64);
        assert!(seen.lock().unwrap().iter().all(|r| !r.silent));
    }

    #[test]
    fn partial_line_waits_for_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Journal.1.log");
        append(&path, "");

        let (mut tailer, seen) = collecting_tailer(dir.path());
        tailer.attach(&path, false).unwrap();
        append(&path, "{\"type\":\"Sc");
        assert_eq!(tailer.on_file_changed().unwrap(), 0);
        assert_eq!(tailer.cursor().unwrap().offset, 0);

        append(&path, "an\"}\n");
        assert_eq!(tailer.on_file_changed().unwrap(), 1);
        assert_eq!(seen.lock().unwrap()[0].record.type_name(), "Scan");
    }

    #[test]
    fn rotation_retargets_and_resets_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("Journal.1.log");
        append(&old, "{\"type\":\"Scan\"}\n");
        set_mtime(&old, 100);

        let (mut tailer, seen) = collecting_tailer(dir.path());
        tailer.attach(&old, false).unwrap();
        assert!(!tailer.poll_for_rotation().unwrap());

        let new = dir.path().join("Journal.2.log");
        append(&new, "{\"type\":\"SessionStart\"}\n");
        set_mtime(&new, 200);

        assert!(tailer.poll_for_rotation().unwrap());
        assert_eq!(tailer.current_file(), Some(new.as_path()));
        // No bootstrap on rotation: the existing line is not replayed.
        assert!(seen.lock().unwrap().is_empty());

        append(&new, "{\"type\":\"Arrival\"}\n");
        assert_eq!(tailer.on_file_changed().unwrap(), 1);
    }

    #[test]
    fn first_poll_attaches_with_bootstrap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Journal.1.log");
        append(&path, "{\"type\":\"SessionStart\",\"system\":\"Sol\"}\n");

        let (tailer, seen) = collecting_tailer(dir.path());
        let mut tailer = tailer.with_bootstrap(true);
        assert!(tailer.poll_for_rotation().unwrap());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].silent);
        assert_eq!(seen[1].record.type_name(), "StateLoaded");
    }
}
