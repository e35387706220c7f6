//! Pool configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlpool_core::{Result, SqlpoolError};

use crate::backoff::BackoffStrategy;

/// What `acquire` does when a wait chunk elapses with the idle store still empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquirePolicy {
    /// Keep waiting in `acquire_timeout` sized chunks until a connection shows up
    #[default]
    RetryForever,
    /// Return `SqlpoolError::Timeout` after the first chunk elapses
    FailAfterTimeout,
}

/// How the pool decides to create connections beyond the idle floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthPolicy {
    /// Only the replenish worker creates connections, and only to keep the
    /// idle store at `min_size`. `max_size` is never consulted.
    #[default]
    FloorOnly,
    /// An acquirer facing an empty idle store creates a connection itself as
    /// long as `idle + leased` stays below `max_size`. Replenishment also
    /// respects the ceiling.
    BurstToMax,
}

/// Configuration for a connection pool
///
/// Controls pool sizing, timeouts, and background maintenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle floor the replenish worker maintains and eviction never crosses
    min_size: usize,
    /// Upper bound on connections; only enforced under `GrowthPolicy::BurstToMax`
    max_size: usize,
    /// Length of one blocked wait chunk in `acquire`, in milliseconds
    acquire_timeout_ms: u64,
    /// Idle time in milliseconds after which a connection above the floor is evicted
    max_idle_ms: u64,
    /// Period of the eviction worker in milliseconds
    eviction_interval_ms: u64,
    acquire_policy: AcquirePolicy,
    growth_policy: GrowthPolicy,
    /// First retry delay after a failed replenish attempt
    replenish_backoff_initial_ms: u64,
    /// Cap on the replenish retry delay
    replenish_backoff_max_ms: u64,
}

impl PoolConfig {
    /// Create a new pool configuration with the given min and max sizes
    ///
    /// # Panics
    ///
    /// Panics if `min_size > max_size` or if `max_size` is 0.
    pub fn new(min_size: usize, max_size: usize) -> Self {
        assert!(
            max_size > 0,
            "max_size must be greater than 0, got {}",
            max_size
        );
        assert!(
            min_size <= max_size,
            "min_size ({}) cannot exceed max_size ({})",
            min_size,
            max_size
        );

        Self {
            min_size,
            max_size,
            acquire_timeout_ms: 30_000,
            max_idle_ms: 600_000,
            eviction_interval_ms: 500,
            acquire_policy: AcquirePolicy::RetryForever,
            growth_policy: GrowthPolicy::FloorOnly,
            replenish_backoff_initial_ms: 100,
            replenish_backoff_max_ms: 30_000,
        }
    }

    /// Set the length of one acquire wait chunk in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Set the maximum idle duration in milliseconds
    pub fn with_max_idle_ms(mut self, max_idle_ms: u64) -> Self {
        self.max_idle_ms = max_idle_ms;
        self
    }

    /// Set the eviction polling interval in milliseconds
    pub fn with_eviction_interval_ms(mut self, interval_ms: u64) -> Self {
        self.eviction_interval_ms = interval_ms;
        self
    }

    pub fn with_acquire_policy(mut self, policy: AcquirePolicy) -> Self {
        self.acquire_policy = policy;
        self
    }

    pub fn with_growth_policy(mut self, policy: GrowthPolicy) -> Self {
        self.growth_policy = policy;
        self
    }

    /// Set the replenish retry backoff bounds in milliseconds
    pub fn with_replenish_backoff_ms(mut self, initial_ms: u64, max_ms: u64) -> Self {
        self.replenish_backoff_initial_ms = initial_ms;
        self.replenish_backoff_max_ms = max_ms;
        self
    }

    /// Get the minimum pool size
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Get the maximum pool size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the acquire wait chunk as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Get the maximum idle duration
    pub fn max_idle(&self) -> Duration {
        Duration::from_millis(self.max_idle_ms)
    }

    /// Get the eviction polling interval
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms)
    }

    pub fn acquire_policy(&self) -> AcquirePolicy {
        self.acquire_policy
    }

    pub fn growth_policy(&self) -> GrowthPolicy {
        self.growth_policy
    }

    /// Backoff used by the replenish worker after a failed creation
    pub fn replenish_backoff(&self) -> BackoffStrategy {
        BackoffStrategy::new(
            self.replenish_backoff_initial_ms,
            self.replenish_backoff_max_ms,
        )
    }

    /// Check the invariants `new` asserts, for configs built through serde
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(SqlpoolError::Configuration(
                "max_size must be greater than 0".into(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(SqlpoolError::Configuration(format!(
                "min_size ({}) cannot exceed max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(SqlpoolError::Configuration(
                "acquire_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.eviction_interval_ms == 0 {
            return Err(SqlpoolError::Configuration(
                "eviction_interval_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    /// Create a default pool configuration
    ///
    /// Defaults:
    /// - min_size: 1
    /// - max_size: 10
    /// - acquire_timeout: 30 seconds per wait chunk, retrying forever
    /// - max_idle: 10 minutes
    /// - eviction_interval: 500 milliseconds
    /// - growth: floor only
    fn default() -> Self {
        Self::new(1, 10)
    }
}
