//! The alarm episode: repeated playback until dismissal or the repeat
//! budget runs out.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use crate::controller::ProgramEvent;
use crate::player::{AlarmPlayer, PlaybackError};

pub const ALARM_REPEATS: u32 = 10;

/// How often an active playback checks the dismissal latch.
const DISMISS_POLL: Duration = Duration::from_millis(50);

/// Runs one alarm episode. Returns with no playback left running, whether
/// the episode ended by dismissal, playback failure, or natural exhaustion
/// of the repeat budget.
pub fn ring(
    player: &mut dyn AlarmPlayer,
    sound_path: Option<&Path>,
    stop_alarm: &AtomicBool,
    events: &Sender<ProgramEvent>,
) {
    let Some(path) = sound_path else {
        let _ = events.send(ProgramEvent::Log(
            "No valid sound file provided; skipping alarm sound.".to_string(),
        ));
        return;
    };

    'episode: for attempt in 1..=ALARM_REPEATS {
        if stop_alarm.load(Ordering::Relaxed) {
            break;
        }
        let mut playback = match player.play(path) {
            Ok(playback) => playback,
            Err(
                err @ (PlaybackError::ResourceNotFound(_) | PlaybackError::PlayerNotFound(_)),
            ) => {
                let _ = events.send(ProgramEvent::Log(format!(
                    "{err}; cannot play alarm sound."
                )));
                break;
            }
            Err(err) => {
                let _ = events.send(ProgramEvent::Log(format!(
                    "Failed to play alarm sound: {err}"
                )));
                break;
            }
        };
        let _ = events.send(ProgramEvent::Log(format!(
            "Alarm #{attempt}/{ALARM_REPEATS}"
        )));

        while playback.is_active() {
            if stop_alarm.load(Ordering::Relaxed) {
                playback.stop();
                break 'episode;
            }
            thread::sleep(DISMISS_POLL);
        }
    }
}
