//! Cooldown Gate
//!
//! Advises whether a dispatch for a key should run, based on when the key was
//! last applied. The gate never invokes handlers itself.

mod clock;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub use clock::{Clock, ManualClock, SystemClock};

/// Last applied dispatch per key plus the active window
#[derive(Debug, Default)]
pub struct CooldownState {
    window: Duration,
    last_applied: HashMap<String, Instant>,
}

/// Per-key throttle shared by everything dispatching through it
#[derive(Debug, Default)]
pub struct CooldownGate {
    state: Mutex<CooldownState>,
}

impl CooldownGate {
    /// Gate with throttling disabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate with the given window
    pub fn with_window(window: Duration) -> Self {
        let gate = Self::default();
        gate.set_window(window);
        gate
    }

    /// Change the window for all keys from now on
    pub fn set_window(&self, window: Duration) {
        self.state.lock().window = window;
    }

    pub fn window(&self) -> Duration {
        self.state.lock().window
    }

    /// Whether a dispatch for `key` at `now` should run
    pub fn should_apply(&self, key: &str, now: Instant, forced: bool) -> bool {
        if forced {
            return true;
        }
        let state = self.state.lock();
        match state.last_applied.get(key) {
            None => true,
            Some(last) => now.saturating_duration_since(*last) >= state.window,
        }
    }

    /// Record that a handler for `key` actually ran at `now`
    pub fn record_applied(&self, key: &str, now: Instant) {
        self.state.lock().last_applied.insert(key.to_string(), now);
    }

    /// When `key` was last applied
    pub fn last_applied(&self, key: &str) -> Option<Instant> {
        self.state.lock().last_applied.get(key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_dispatch_always_applies() {
        let gate = CooldownGate::with_window(Duration::from_secs(5));
        assert!(gate.should_apply("builder0", Instant::now(), false));
    }

    #[test]
    fn test_suppressed_within_window() {
        let gate = CooldownGate::with_window(Duration::from_millis(5000));
        let start = Instant::now();
        gate.record_applied("test", start);

        assert!(!gate.should_apply("test", start + Duration::from_millis(4999), false));
        assert!(gate.should_apply("test", start + Duration::from_millis(5000), false));
    }

    #[test]
    fn test_forced_bypasses_window() {
        let gate = CooldownGate::with_window(Duration::from_secs(60));
        let start = Instant::now();
        gate.record_applied("test", start);

        assert!(gate.should_apply("test", start, true));
    }

    #[test]
    fn test_zero_window_disables_throttling() {
        let gate = CooldownGate::new();
        let now = Instant::now();
        gate.record_applied("test", now);

        assert!(gate.should_apply("test", now, false));
    }

    #[test]
    fn test_keys_are_independent() {
        let gate = CooldownGate::with_window(Duration::from_secs(5));
        let now = Instant::now();
        gate.record_applied("builder0", now);

        assert!(!gate.should_apply("builder0", now, false));
        assert!(gate.should_apply("builder1", now, false));
    }

    #[test]
    fn test_window_change_applies_to_existing_keys() {
        let gate = CooldownGate::with_window(Duration::from_secs(5));
        let start = Instant::now();
        gate.record_applied("test", start);
        assert!(!gate.should_apply("test", start + Duration::from_secs(1), false));

        gate.set_window(Duration::from_millis(500));
        assert!(gate.should_apply("test", start + Duration::from_secs(1), false));
        assert_eq!(gate.last_applied("test"), Some(start));
    }
}
