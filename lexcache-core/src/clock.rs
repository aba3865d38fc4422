//! Execution clock.
//!
//! Every expiry computation in one logical request uses the same "now". The
//! clock is captured once and replaced explicitly, never re-sampled per call.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Unix timestamp in seconds.
pub type UnixTimestamp = i64;

/// A frozen point in time used as "now" for expiry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExecutionClock {
    now: UnixTimestamp,
}

impl ExecutionClock {
    /// Capture the current wall-clock time.
    pub fn capture() -> Self {
        Self {
            now: Utc::now().timestamp(),
        }
    }

    /// A clock frozen at an explicit timestamp.
    pub fn at(now: UnixTimestamp) -> Self {
        Self { now }
    }

    /// The captured timestamp.
    pub fn now(&self) -> UnixTimestamp {
        self.now
    }

    /// A new clock moved by `seconds` (negative moves backwards).
    pub fn advanced_by(&self, seconds: i64) -> Self {
        Self {
            now: self.now.saturating_add(seconds),
        }
    }
}

impl Default for ExecutionClock {
    fn default() -> Self {
        Self::capture()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_is_close_to_wall_clock() {
        let clock = ExecutionClock::capture();
        let wall = Utc::now().timestamp();
        assert!((wall - clock.now()).abs() <= 1);
    }

    #[test]
    fn test_advanced_by_does_not_mutate() {
        let clock = ExecutionClock::at(1_000);
        let later = clock.advanced_by(61);
        assert_eq!(clock.now(), 1_000);
        assert_eq!(later.now(), 1_061);
        assert!(later > clock);
    }

    #[test]
    fn test_advanced_by_saturates() {
        let clock = ExecutionClock::at(i64::MAX - 1);
        assert_eq!(clock.advanced_by(10).now(), i64::MAX);
    }
}
