//! Playback through an external command-line player.
//!
//! Each clip is written to a temporary WAV file and handed to `aplay`,
//! `paplay` or `ffplay`. The child process is killed when the dispatcher
//! raises its interrupt flag or calls `stop`.
//!
//! Env overrides:
//! - STARLOG_PLAYER (aplay|paplay|ffplay), optional preference
//! - TTS_TEMP_DIR

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use starlog_core::{AudioClip, PlaybackOutcome, PlaybackSink, StarlogError};
use tracing::{debug, info, warn};

use crate::utils::{gen_id, get_from_path};
use crate::wav::write_wav;

const PLAYERS: [&str; 3] = ["aplay", "paplay", "ffplay"];
const WAIT_STEP: Duration = Duration::from_millis(20);

#[derive(Clone, Debug)]
pub struct PlayerConfig {
    pub preferred: Option<String>,
    pub temp_dir: PathBuf,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            preferred: std::env::var("STARLOG_PLAYER")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            temp_dir: std::env::var("TTS_TEMP_DIR")
                .ok()
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        }
    }
}

fn select_player(pref: Option<&str>) -> Option<PathBuf> {
    if let Some(bin) = pref.and_then(get_from_path) {
        return Some(bin);
    }
    if let Some(p) = pref {
        warn!(target = "player", preferred = %p, "Preferred player not found, trying defaults");
    }
    PLAYERS.iter().find_map(|p| get_from_path(p))
}

fn player_command(bin: &Path, wav: &Path) -> Command {
    let name = bin.file_name().and_then(|s| s.to_str()).unwrap_or("");
    let mut cmd = Command::new(bin);
    if name == "ffplay" {
        cmd.args(["-autoexit", "-nodisp", "-loglevel", "quiet"]);
    }
    cmd.arg(wav);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    cmd
}

pub struct CommandPlayer {
    bin: PathBuf,
    temp_dir: PathBuf,
    child: Mutex<Option<Child>>,
    stopped: AtomicBool,
}

impl CommandPlayer {
    /// First available player, preferring `cfg.preferred`.
    pub fn detect(cfg: PlayerConfig) -> Option<Self> {
        let bin = select_player(cfg.preferred.as_deref())?;
        info!(target = "player", bin = ?bin, "Selected audio player");
        Some(Self::with_binary(bin, cfg.temp_dir))
    }

    pub fn with_binary(bin: PathBuf, temp_dir: PathBuf) -> Self {
        Self {
            bin,
            temp_dir,
            child: Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.bin
    }

    fn kill_child(&self) {
        if let Some(mut child) = self.child.lock().take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn wait(&self, interrupt: &AtomicBool) -> starlog_core::Result<PlaybackOutcome> {
        loop {
            if interrupt.load(Ordering::SeqCst) || self.stopped.load(Ordering::SeqCst) {
                self.kill_child();
                return Ok(PlaybackOutcome::Interrupted);
            }
            {
                let mut guard = self.child.lock();
                let Some(child) = guard.as_mut() else {
                    // Killed by `stop` from another thread.
                    return Ok(PlaybackOutcome::Interrupted);
                };
                if let Some(status) = child.try_wait()? {
                    guard.take();
                    if !status.success() {
                        return Err(StarlogError::PlaybackError(format!(
                            "{} exited with {}",
                            self.bin.display(),
                            status
                        )));
                    }
                    return Ok(PlaybackOutcome::Completed);
                }
            }
            std::thread::sleep(WAIT_STEP);
        }
    }
}

impl PlaybackSink for CommandPlayer {
    fn play(&self, clip: &AudioClip, interrupt: &AtomicBool) -> starlog_core::Result<PlaybackOutcome> {
        self.stopped.store(false, Ordering::SeqCst);
        std::fs::create_dir_all(&self.temp_dir)?;
        let wav = self.temp_dir.join(format!("starlog_{}.wav", gen_id()));
        write_wav(&wav, clip)?;

        let mut cmd = player_command(&self.bin, &wav);
        debug!(target = "player", command = ?cmd, "Starting playback");
        let outcome = match cmd.spawn() {
            Ok(child) => {
                *self.child.lock() = Some(child);
                self.wait(interrupt)
            }
            Err(e) => Err(StarlogError::PlaybackError(format!(
                "failed to start {}: {}",
                self.bin.display(),
                e
            ))),
        };
        let _ = std::fs::remove_file(&wav);
        outcome
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.kill_child();
    }
}

impl Drop for CommandPlayer {
    fn drop(&mut self) {
        self.kill_child();
    }
}
