//! Wake-time derivation from a deadline and a live travel-time sample.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;

/// One poll's snapshot of the wake-time arithmetic. Recomputed fresh every
/// poll and never cached; a new ETA sample may move `wake_time` either way.
#[derive(Debug, Clone)]
pub struct WakeComputation {
    pub now: DateTime<Tz>,
    pub arrival_deadline: DateTime<Tz>,
    pub eta_seconds: u32,
    pub depart_latest: DateTime<Tz>,
    pub wake_time: DateTime<Tz>,
    pub wake_now: bool,
}

impl WakeComputation {
    /// Whole seconds until the wake time; negative once it has passed.
    pub fn remaining_seconds(&self) -> i64 {
        (self.wake_time - self.now).num_seconds()
    }

    pub fn eta_minutes(&self) -> u32 {
        self.eta_seconds / 60
    }
}

/// Pure derivation: `depart_latest = deadline - eta - buffer`,
/// `wake_time = depart_latest - prep`. The ETA sample is an argument; this
/// function never fetches anything itself.
pub fn compute(
    arrival_deadline: DateTime<Tz>,
    prep: Duration,
    buffer: Duration,
    eta_seconds: u32,
    now: DateTime<Tz>,
) -> WakeComputation {
    let depart_latest = arrival_deadline - Duration::seconds(i64::from(eta_seconds)) - buffer;
    let wake_time = depart_latest - prep;
    WakeComputation {
        now,
        arrival_deadline,
        eta_seconds,
        depart_latest,
        wake_time,
        wake_now: now >= wake_time,
    }
}
