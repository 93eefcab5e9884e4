//! Adaptive poll cadence: coarse fixed polling far from the wake time,
//! proportionally tightening polling inside the fine window.

/// Floor on every sleep interval, so the ETA source is never hammered.
pub const MIN_SLEEP_SECONDS: u64 = 15;

/// Seconds to sleep before the next wake-time recomputation.
///
/// Outside the fine window the cadence is fixed at the coarse interval.
/// Inside it, the interval is a quarter of the remaining time, clamped to
/// `[MIN_SLEEP_SECONDS, fine_poll_seconds]`, so polling self-tightens as the
/// wake time approaches.
pub fn next_sleep_seconds(
    remaining_seconds: i64,
    coarse_poll_seconds: u32,
    fine_poll_seconds: u32,
    fine_window_minutes: u32,
) -> u64 {
    let remaining = remaining_seconds.max(0) as u64;
    if remaining <= u64::from(fine_window_minutes) * 60 {
        (remaining / 4)
            .max(MIN_SLEEP_SECONDS)
            .min(u64::from(fine_poll_seconds))
    } else {
        u64::from(coarse_poll_seconds).max(MIN_SLEEP_SECONDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarse_interval_outside_fine_window() {
        // 31 minutes out with a 30 minute window: fine poll must not matter.
        assert_eq!(next_sleep_seconds(31 * 60, 180, 60, 30), 180);
        assert_eq!(next_sleep_seconds(31 * 60, 180, 5, 30), 180);
        assert_eq!(next_sleep_seconds(86_400, 300, 60, 30), 300);
    }

    #[test]
    fn coarse_interval_respects_floor() {
        assert_eq!(next_sleep_seconds(31 * 60, 5, 60, 30), 15);
        assert_eq!(next_sleep_seconds(31 * 60, 15, 60, 30), 15);
    }

    #[test]
    fn window_boundary_uses_fine_branch() {
        // remaining == window exactly: 1800 / 4 = 450, capped at fine poll.
        assert_eq!(next_sleep_seconds(30 * 60, 180, 60, 30), 60);
    }

    #[test]
    fn ten_minutes_out_caps_at_fine_poll() {
        // 600 / 4 = 150, capped at 60.
        assert_eq!(next_sleep_seconds(600, 180, 60, 30), 60);
    }

    #[test]
    fn forty_seconds_out_hits_floor() {
        // 40 / 4 = 10, raised to the 15 second floor.
        assert_eq!(next_sleep_seconds(40, 180, 60, 30), 15);
    }

    #[test]
    fn fine_interval_is_monotonic_in_remaining_time() {
        let mut previous = 0;
        for remaining in 0..=(30 * 60) {
            let sleep = next_sleep_seconds(remaining, 180, 60, 30);
            assert!(sleep >= previous, "cadence regressed at remaining={remaining}");
            assert!((15..=60).contains(&sleep));
            previous = sleep;
        }
    }

    #[test]
    fn negative_remaining_is_treated_as_zero() {
        assert_eq!(next_sleep_seconds(-10, 180, 60, 30), 15);
    }
}
