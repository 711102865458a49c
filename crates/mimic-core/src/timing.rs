//! Hybrid sleep/spin wait for sub-millisecond deadlines.
//!
//! OS sleeps are coarse (commonly ~15ms granularity), so long gaps are covered
//! by sleeping up to a safety margin before the deadline, then a short sleep
//! closes in to ~2ms, and the remainder is busy-polled against the clock.

use std::hint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Remaining time above which the coarse sleep is used.
pub const COARSE_MARGIN: Duration = Duration::from_millis(15);
/// Remaining time above which the fine sleep is used; below it we spin.
pub const FINE_MARGIN: Duration = Duration::from_millis(2);
/// Longest single sleep, so cancellation is seen during long gaps.
pub const MAX_SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Block until `clock.elapsed() >= target`.
///
/// Returns `false` as soon as `cancel` is observed set, `true` when the
/// deadline was reached. A target already in the past returns immediately.
pub fn wait_until(clock: Instant, target: Duration, cancel: &AtomicBool) -> bool {
    loop {
        if cancel.load(Ordering::Acquire) {
            return false;
        }
        let elapsed = clock.elapsed();
        if elapsed >= target {
            return true;
        }
        let remaining = target - elapsed;
        if remaining > COARSE_MARGIN {
            thread::sleep((remaining - COARSE_MARGIN).min(MAX_SLEEP_SLICE));
        } else if remaining > FINE_MARGIN {
            thread::sleep(remaining - FINE_MARGIN);
        } else {
            break;
        }
    }

    while clock.elapsed() < target {
        if cancel.load(Ordering::Acquire) {
            return false;
        }
        hint::spin_loop();
    }
    true
}

/// Cancellable plain delay.
pub fn delay(duration: Duration, cancel: &AtomicBool) -> bool {
    wait_until(Instant::now(), duration, cancel)
}

/// `offset / speed`; speeds above 1.0 shorten the wait. Saturates at
/// [`Duration::MAX`] instead of overflowing.
pub fn scale(offset: Duration, speed_multiplier: f64) -> Duration {
    Duration::try_from_secs_f64(offset.as_secs_f64() / speed_multiplier).unwrap_or(Duration::MAX)
}
