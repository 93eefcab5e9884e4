//! Alarm-sound playback seam. The core never touches a process handle
//! directly; it drives `AlarmPlayer`/`Playback`, and the subprocess-backed
//! implementation lives behind that boundary.

use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("sound resource not found: {0}")]
    ResourceNotFound(String),
    #[error("player program '{0}' not found")]
    PlayerNotFound(String),
    #[error("playback failed: {0}")]
    Failed(String),
}

/// One in-flight playback. `stop` must leave no process running.
pub trait Playback: Send + std::fmt::Debug {
    fn is_active(&mut self) -> bool;
    fn stop(&mut self);
}

pub trait AlarmPlayer: Send {
    fn play(&mut self, resource: &Path) -> Result<Box<dyn Playback>, PlaybackError>;
}

/// Plays a sound file by spawning an external player program once per
/// repetition, the way the alarm originally shelled out to `afplay`.
pub struct CommandAlarmPlayer {
    program: String,
}

impl CommandAlarmPlayer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn default_program() -> &'static str {
        if cfg!(target_os = "macos") { "afplay" } else { "aplay" }
    }
}

impl AlarmPlayer for CommandAlarmPlayer {
    fn play(&mut self, resource: &Path) -> Result<Box<dyn Playback>, PlaybackError> {
        if !resource.exists() {
            return Err(PlaybackError::ResourceNotFound(
                resource.display().to_string(),
            ));
        }
        match Command::new(&self.program)
            .arg(resource)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => Ok(Box::new(ChildPlayback { child })),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(PlaybackError::PlayerNotFound(self.program.clone()))
            }
            Err(err) => Err(PlaybackError::Failed(err.to_string())),
        }
    }
}

#[derive(Debug)]
struct ChildPlayback {
    child: Child,
}

impl Playback for ChildPlayback {
    fn is_active(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn stop(&mut self) {
        // kill, then reap, so no zombie outlives the alarm episode
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
