//! # Fibonacci Backoff
//!
//! Delay sequence between conditional-write retries after a version conflict.
//! Grows more slowly than exponential backoff, which suits a conflict that is
//! usually resolved by the very next attempt.
//!
//! Default sequence: 10ms, 10ms, 20ms, 30ms, 50ms, 80ms, ... capped at 1s.

use std::time::Duration;

/// Shortest delay, used for the first two retries
pub const DEFAULT_MIN: Duration = Duration::from_millis(10);
/// Longest delay
pub const DEFAULT_MAX: Duration = Duration::from_secs(1);

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Previous delay
    prev: Duration,
    /// Delay returned by the next call
    current: Duration,
    /// Cap
    max: Duration,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min` and capped at `max`.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            prev: Duration::ZERO,
            current: min.min(max),
            max,
        }
    }

    /// Get the next delay and advance the sequence.
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        let next = self.prev + self.current;
        self.prev = self.current;
        self.current = next.min(self.max);
        result
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_MIN, DEFAULT_MAX)
    }
}
