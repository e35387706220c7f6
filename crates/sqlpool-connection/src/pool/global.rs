//! Process-wide pool accessor
//!
//! Passing a cloned [`ConnectionPool`] around is the primary API. This module
//! is for code that cannot thread a handle through, and keeps the pool alive
//! for the rest of the process once installed.

use std::sync::OnceLock;

use parking_lot::{Mutex, const_mutex};
use sqlpool_core::{Result, SqlpoolError};

use super::config::PoolConfig;
use super::pool::{ConnectionFactory, ConnectionPool};

static GLOBAL_POOL: OnceLock<ConnectionPool> = OnceLock::new();
static INIT_LOCK: Mutex<()> = const_mutex(());

/// Start the process pool and install it.
///
/// Returns `SqlpoolError::AlreadyInitialized` without touching the factory if
/// a pool is already installed. If initialization fails nothing is installed
/// and a later call may try again.
pub fn init<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Result<ConnectionPool> {
    let _guard = INIT_LOCK.lock();
    if GLOBAL_POOL.get().is_some() {
        return Err(SqlpoolError::AlreadyInitialized);
    }

    let pool = ConnectionPool::start(config, factory)?;
    tracing::info!(pool_id = %pool.id(), "installed process-wide connection pool");
    Ok(GLOBAL_POOL.get_or_init(|| pool).clone())
}

/// Handle to the process pool. Every call returns the same pool.
pub fn pool() -> Result<ConnectionPool> {
    GLOBAL_POOL.get().cloned().ok_or(SqlpoolError::NotInitialized)
}
