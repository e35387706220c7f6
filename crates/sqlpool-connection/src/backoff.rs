//! Exponential backoff for retrying connection creation
//!
//! The replenish worker uses this to space out attempts while the database
//! is unreachable instead of hammering it in a tight loop.

use std::time::Duration;

#[cfg(test)]
mod tests;

/// Exponential backoff strategy for connection retries.
///
/// Calculates delays that grow exponentially with each attempt,
/// up to a configurable maximum.
///
/// # Example
///
/// ```
/// use sqlpool_connection::BackoffStrategy;
/// use std::time::Duration;
///
/// let backoff = BackoffStrategy::new(100, 30_000);
///
/// assert_eq!(backoff.calculate_delay(0), Duration::from_millis(100));
/// assert_eq!(backoff.calculate_delay(1), Duration::from_millis(200));
///
/// // Delay grows exponentially but is capped at max
/// assert!(backoff.calculate_delay(20) <= Duration::from_millis(30_000));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffStrategy {
    /// Initial delay in milliseconds for the first retry
    initial_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential growth)
    max_ms: u64,
}

/// Each retry waits twice as long as the previous one
const MULTIPLIER: f64 = 2.0;

impl BackoffStrategy {
    /// Create a new backoff strategy with the given initial and maximum delays.
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        let initial_ms = initial_ms.max(1);
        Self {
            initial_ms,
            max_ms: max_ms.max(initial_ms),
        }
    }

    /// Calculate the delay for a given attempt number.
    ///
    /// Attempt 0 returns the initial delay, with subsequent attempts
    /// growing exponentially up to the maximum.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay_ms = (self.initial_ms as f64) * MULTIPLIER.powi(exponent);
        let capped_ms = delay_ms.min(self.max_ms as f64) as u64;
        Duration::from_millis(capped_ms)
    }

    /// Get the initial delay.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }

    /// Get the maximum delay.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

impl Default for BackoffStrategy {
    /// Default backoff: 100ms initial, 30 seconds max
    fn default() -> Self {
        Self::new(100, 30_000)
    }
}
