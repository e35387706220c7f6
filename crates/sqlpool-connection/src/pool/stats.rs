//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Statistics about a connection pool's current state
///
/// A snapshot taken under the pool lock, so the counts are consistent with
/// each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of idle connections available in the pool
    idle: usize,
    /// Number of connections currently leased out
    leased: usize,
    /// Number of callers blocked in `acquire`
    waiting: usize,
    /// Connections created since the pool started
    created: u64,
    /// Connections closed by eviction, shutdown, or because they came back closed
    destroyed: u64,
}

impl PoolStats {
    /// Create new pool statistics
    pub fn new(idle: usize, leased: usize, waiting: usize, created: u64, destroyed: u64) -> Self {
        Self {
            idle,
            leased,
            waiting,
            created,
            destroyed,
        }
    }

    /// Get the total number of live connections (idle + leased)
    pub fn total(&self) -> usize {
        self.idle + self.leased
    }

    /// Get the number of idle connections
    pub fn idle(&self) -> usize {
        self.idle
    }

    /// Get the number of leased (in-use) connections
    pub fn leased(&self) -> usize {
        self.leased
    }

    /// Get the number of waiting callers
    pub fn waiting(&self) -> usize {
        self.waiting
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn destroyed(&self) -> u64 {
        self.destroyed
    }

    /// Calculate pool utilization as a fraction (0.0 to 1.0)
    ///
    /// Returns 0.0 if total is 0 to avoid division by zero.
    pub fn utilization(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.leased as f64 / total as f64
        }
    }
}
