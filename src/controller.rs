//! Program lifecycle: the Idle/Running/Paused/Ringing state machine, the
//! background worker that polls the ETA source, and the event channel the
//! presentation layer drains.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::config::ProgramConfig;
use crate::eta::EtaProvider;
use crate::player::AlarmPlayer;
use crate::{schedule, trigger, wake};

/// Granularity of interruptible sleeps, so stop and pause take effect
/// promptly even mid-interval.
const SLEEP_SLICE: StdDuration = StdDuration::from_millis(200);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ProgramState {
    Idle,
    Running,
    Paused,
    Ringing,
}

impl ProgramState {
    /// Label of the one user action that applies in this state.
    pub fn action_label(self) -> &'static str {
        match self {
            ProgramState::Idle => "Run Program",
            ProgramState::Running => "Pause Program",
            ProgramState::Paused => "Resume Program",
            ProgramState::Ringing => "Stop Alarm",
        }
    }
}

impl fmt::Display for ProgramState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProgramState::Idle => "Idle",
            ProgramState::Running => "Running",
            ProgramState::Paused => "Paused",
            ProgramState::Ringing => "Ringing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum ProgramEvent {
    Log(String),
    StateChanged {
        state: ProgramState,
        action_label: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
struct Status {
    state: ProgramState,
    action_label: &'static str,
}

struct Shared {
    // state and its user-facing label always change together
    status: Mutex<Status>,
    paused: Mutex<bool>,
    pause_changed: Condvar,
    stop_program: AtomicBool,
    stop_alarm: AtomicBool,
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn set_state(shared: &Shared, events: &Sender<ProgramEvent>, state: ProgramState) {
    let action_label = state.action_label();
    {
        let mut status = lock_or_recover(&shared.status);
        *status = Status {
            state,
            action_label,
        };
    }
    let _ = events.send(ProgramEvent::StateChanged {
        state,
        action_label,
    });
}

/// Owns one run at a time: `start` spawns the worker thread, the remaining
/// methods flip latches the worker observes. Invalid transitions are ignored.
pub struct ProgramController {
    shared: Arc<Shared>,
    events: Sender<ProgramEvent>,
    worker: Option<JoinHandle<()>>,
}

impl ProgramController {
    pub fn new() -> (Self, Receiver<ProgramEvent>) {
        let (events, receiver) = mpsc::channel();
        let shared = Arc::new(Shared {
            status: Mutex::new(Status {
                state: ProgramState::Idle,
                action_label: ProgramState::Idle.action_label(),
            }),
            paused: Mutex::new(false),
            pause_changed: Condvar::new(),
            stop_program: AtomicBool::new(false),
            stop_alarm: AtomicBool::new(false),
        });
        (
            Self {
                shared,
                events,
                worker: None,
            },
            receiver,
        )
    }

    pub fn state(&self) -> ProgramState {
        lock_or_recover(&self.shared.status).state
    }

    /// Spawns the worker for one run. Returns false (and does nothing) when
    /// a run is already active; latches are cleared only here.
    pub fn start(
        &mut self,
        config: ProgramConfig,
        eta: Box<dyn EtaProvider>,
        player: Box<dyn AlarmPlayer>,
    ) -> bool {
        if self.state() != ProgramState::Idle {
            let _ = self
                .events
                .send(ProgramEvent::Log("Program already active; start ignored.".to_string()));
            return false;
        }
        // reap the previous run's thread if it ended on its own
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        self.shared.stop_program.store(false, Ordering::Relaxed);
        self.shared.stop_alarm.store(false, Ordering::Relaxed);
        *lock_or_recover(&self.shared.paused) = false;

        set_state(&self.shared, &self.events, ProgramState::Running);
        let _ = self
            .events
            .send(ProgramEvent::Log("Program started.".to_string()));

        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();
        self.worker = Some(thread::spawn(move || {
            run_worker(shared, events, config, eta, player);
        }));
        true
    }

    pub fn pause(&self) {
        if self.state() != ProgramState::Running {
            return;
        }
        *lock_or_recover(&self.shared.paused) = true;
        set_state(&self.shared, &self.events, ProgramState::Paused);
        let _ = self
            .events
            .send(ProgramEvent::Log("Program paused.".to_string()));
    }

    pub fn resume(&self) {
        if self.state() != ProgramState::Paused {
            return;
        }
        {
            let mut paused = lock_or_recover(&self.shared.paused);
            *paused = false;
        }
        self.shared.pause_changed.notify_all();
        set_state(&self.shared, &self.events, ProgramState::Running);
        let _ = self
            .events
            .send(ProgramEvent::Log("Program resumed.".to_string()));
    }

    /// Ends a running or paused program; waits for the worker to exit.
    pub fn stop(&mut self) {
        if !matches!(self.state(), ProgramState::Running | ProgramState::Paused) {
            return;
        }
        self.shared.stop_program.store(true, Ordering::Relaxed);
        {
            let mut paused = lock_or_recover(&self.shared.paused);
            *paused = false;
        }
        self.shared.pause_changed.notify_all();
        let _ = self
            .events
            .send(ProgramEvent::Log("Program stopped.".to_string()));
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    /// Dismisses a ringing alarm. Idempotent; the worker finishes the
    /// episode and returns the state to Idle.
    pub fn stop_alarm(&self) {
        if self.state() != ProgramState::Ringing {
            return;
        }
        self.shared.stop_alarm.store(true, Ordering::Relaxed);
        let _ = self
            .events
            .send(ProgramEvent::Log("Alarm stopped.".to_string()));
    }

    /// Waits for a naturally-ending run (alarm fired or episode finished).
    pub fn join(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ProgramController {
    fn drop(&mut self) {
        self.shared.stop_program.store(true, Ordering::Relaxed);
        self.shared.stop_alarm.store(true, Ordering::Relaxed);
        {
            let mut paused = lock_or_recover(&self.shared.paused);
            *paused = false;
        }
        self.shared.pause_changed.notify_all();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

fn run_worker(
    shared: Arc<Shared>,
    events: Sender<ProgramEvent>,
    config: ProgramConfig,
    eta: Box<dyn EtaProvider>,
    mut player: Box<dyn AlarmPlayer>,
) {
    let mut last_wake_time: Option<DateTime<Tz>> = None;

    loop {
        wait_while_paused(&shared);
        if shared.stop_program.load(Ordering::Relaxed) {
            break;
        }

        let now = Utc::now().with_timezone(&config.timezone);
        let eta_seconds = match eta.estimate_travel_seconds(&config.origin, &config.destination) {
            Ok(seconds) => seconds,
            Err(err) => {
                let _ = events.send(ProgramEvent::Log(format!("ETA request failed: {err}")));
                // transient estimator failures back off to the coarse cadence
                let backoff =
                    u64::from(config.coarse_poll_seconds).max(schedule::MIN_SLEEP_SECONDS);
                if !sleep_interruptible(&shared, StdDuration::from_secs(backoff)) {
                    break;
                }
                continue;
            }
        };
        let snapshot = wake::compute(
            config.arrival_deadline,
            config.prep,
            config.buffer,
            eta_seconds,
            now,
        );

        if last_wake_time != Some(snapshot.wake_time) {
            let _ = events.send(ProgramEvent::Log(format!(
                "ETA={} min; depart_latest={}; wake_time={}",
                snapshot.eta_minutes(),
                snapshot.depart_latest.to_rfc3339(),
                snapshot.wake_time.to_rfc3339(),
            )));
            last_wake_time = Some(snapshot.wake_time);
        }

        if snapshot.wake_now {
            let _ = events.send(ProgramEvent::Log("Triggering alarm.".to_string()));
            set_state(&shared, &events, ProgramState::Ringing);
            trigger::ring(
                player.as_mut(),
                config.sound_path.as_deref(),
                &shared.stop_alarm,
                &events,
            );
            break;
        }

        let sleep_seconds = schedule::next_sleep_seconds(
            snapshot.remaining_seconds(),
            config.coarse_poll_seconds,
            config.fine_poll_seconds,
            config.fine_window_minutes,
        );
        let _ = events.send(ProgramEvent::Log(format!("Next poll in {sleep_seconds}s")));
        if !sleep_interruptible(&shared, StdDuration::from_secs(sleep_seconds)) {
            break;
        }
    }

    set_state(&shared, &events, ProgramState::Idle);
}

/// Parks the worker while the pause latch is set. The timeout keeps a stop
/// request observable even if a notification is missed.
fn wait_while_paused(shared: &Shared) {
    let mut paused = lock_or_recover(&shared.paused);
    while *paused && !shared.stop_program.load(Ordering::Relaxed) {
        let (guard, _timeout) = shared
            .pause_changed
            .wait_timeout(paused, SLEEP_SLICE)
            .unwrap_or_else(PoisonError::into_inner);
        paused = guard;
    }
}

/// Sleeps in short slices. Returns false when the program should stop;
/// returns early (true) when pause is requested so the pause gate engages.
fn sleep_interruptible(shared: &Shared, total: StdDuration) -> bool {
    let mut remaining = total;
    while !remaining.is_zero() {
        if shared.stop_program.load(Ordering::Relaxed) {
            return false;
        }
        if *lock_or_recover(&shared.paused) {
            return true;
        }
        let step = remaining.min(SLEEP_SLICE);
        thread::sleep(step);
        remaining -= step;
    }
    !shared.stop_program.load(Ordering::Relaxed)
}
