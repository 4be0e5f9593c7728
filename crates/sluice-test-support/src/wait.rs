//! Polling helpers for asynchronous filesystem observations.

use std::thread;
use std::time::{Duration, Instant};

/// Poll `condition` every `interval` until it holds or `timeout` elapses.
///
/// Returns whether the condition was observed.
pub fn wait_until(timeout: Duration, interval: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_until_returns_once_condition_holds() {
        let mut calls = 0;
        assert!(wait_until(Duration::from_secs(1), Duration::from_millis(1), || {
            calls += 1;
            calls >= 3
        }));
        assert_eq!(calls, 3);
    }

    #[test]
    fn wait_until_times_out() {
        assert!(!wait_until(
            Duration::from_millis(10),
            Duration::from_millis(2),
            || false
        ));
    }
}
