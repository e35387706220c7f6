//! sqlpool connection - Connection pooling and connection parameters
//!
//! This crate owns the pool: its configuration, the background workers that
//! keep it sized, and the lease handed to callers.

mod backoff;
mod config;
pub mod pool;

pub use backoff::BackoffStrategy;
pub use config::ConnectionParams;
pub use pool::{
    AcquirePolicy, ConnectionFactory, ConnectionPool, GrowthPolicy, Lease, PoolConfig, PoolStats,
    global,
};
