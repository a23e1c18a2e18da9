//! Monotonic wall-clock source shared by the scheduler, clocks and workers.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Seconds elapsed since the first call in this process.
///
/// Every timestamp compared against a [`Clock`](crate::clock::Clock) or the
/// scheduler's frame timer must come from here so they share one origin.
pub fn relative_seconds() -> f64 {
    EPOCH.get_or_init(Instant::now).elapsed().as_secs_f64()
}

/// Convert a non-negative wait in seconds to a [`Duration`].
///
/// Negative or non-finite values map to zero.
pub fn wait_duration(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_seconds_is_monotonic() {
        let first = relative_seconds();
        std::thread::sleep(Duration::from_millis(2));
        let second = relative_seconds();
        assert!(second > first);
    }

    #[test]
    fn invalid_waits_clamp_to_zero() {
        assert_eq!(wait_duration(-1.0), Duration::ZERO);
        assert_eq!(wait_duration(f64::NAN), Duration::ZERO);
        assert_eq!(wait_duration(0.25), Duration::from_millis(250));
    }
}
