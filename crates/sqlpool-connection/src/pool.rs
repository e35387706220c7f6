//! Connection pooling for database connections
//!
//! A bounded pool with a FIFO idle store, blocking acquire, and two
//! background workers: one keeps the idle store at `min_size`, the other
//! closes connections that sat idle longer than `max_idle`.
//!
//! # Example
//!
//! ```ignore
//! use sqlpool_connection::pool::{ConnectionPool, PoolConfig};
//!
//! let config = PoolConfig::new(5, 20)
//!     .with_acquire_timeout_ms(5000)
//!     .with_max_idle_ms(300000);
//!
//! let pool = ConnectionPool::start(config, connection_factory)?;
//! let mut conn = pool.acquire()?;
//! conn.execute("UPDATE accounts SET active = 1", &[])?;
//! // Connection returned to pool on drop
//! ```

mod config;
pub mod global;
mod lease;
mod pool;
mod shutdown;
mod state;
mod stats;
mod workers;


pub use config::{AcquirePolicy, GrowthPolicy, PoolConfig};
pub use lease::Lease;
pub use pool::{ConnectionFactory, ConnectionPool};
pub use stats::PoolStats;
