//! Connection pool implementation

use std::sync::Arc;

use parking_lot::Mutex;
use sqlpool_core::{Connection, Result, SqlpoolError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::config::{AcquirePolicy, PoolConfig};
use super::lease::Lease;
use super::state::{PoolPhase, PoolShared, PooledConnection};
use super::stats::PoolStats;
use super::workers::Workers;

/// Factory trait for creating new connections
///
/// The factory is the only thing that knows how to open a connection; the
/// pool calls it during initialization, from the replenish worker, and from
/// acquirers when burst growth is enabled.
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Open a new connection
    fn create(&self) -> Result<Box<dyn Connection>>;
}

impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    fn create(&self) -> Result<Box<dyn Connection>> {
        (**self).create()
    }
}

/// A connection pool that manages a set of database connections
///
/// The pool keeps an idle store topped up to `min_size` in the background,
/// hands connections out through [`acquire`](ConnectionPool::acquire), and
/// trims connections that have been idle longer than `max_idle`.
///
/// `ConnectionPool` is a cheap handle: clone it to share the same pool
/// between threads. The pool shuts down when [`shutdown`](Self::shutdown) is
/// called or the last handle is dropped.
#[derive(Clone)]
pub struct ConnectionPool {
    handle: Arc<PoolHandle>,
}

struct PoolHandle {
    shared: Arc<PoolShared>,
    workers: Mutex<Option<Workers>>,
}

enum Acquired {
    Idle(PooledConnection),
    Create,
}

impl ConnectionPool {
    /// Create a pool that has not been started yet.
    ///
    /// Call [`initialize`](Self::initialize) before acquiring.
    pub fn new<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Self {
        Self {
            handle: Arc::new(PoolHandle {
                shared: Arc::new(PoolShared::new(config, Arc::new(factory))),
                workers: Mutex::new(None),
            }),
        }
    }

    /// Create and initialize a pool in one step
    pub fn start<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Result<Self> {
        let pool = Self::new(config, factory);
        pool.initialize()?;
        Ok(pool)
    }

    /// Seed the idle store with `min_size` connections and start the
    /// background workers.
    ///
    /// Any creation failure here is fatal: the connections already opened are
    /// closed and `SqlpoolError::Initialization` is returned. Calling this a
    /// second time returns `SqlpoolError::AlreadyInitialized`.
    pub fn initialize(&self) -> Result<()> {
        let shared = &self.handle.shared;
        shared.config.validate()?;

        {
            let mut state = shared.state.lock();
            match state.phase {
                PoolPhase::Created => state.phase = PoolPhase::Initializing,
                PoolPhase::Closed => return Err(SqlpoolError::Closed),
                PoolPhase::Initializing | PoolPhase::Running => {
                    return Err(SqlpoolError::AlreadyInitialized);
                }
            }
        }

        let min_size = shared.config.min_size();
        let mut seeded = Vec::with_capacity(min_size);
        for _ in 0..min_size {
            match shared.create_slot() {
                Ok(slot) => seeded.push(slot),
                Err(e) => {
                    let opened = seeded.len();
                    tracing::error!(
                        pool_id = %shared.id,
                        error = %e,
                        opened,
                        min_size,
                        "failed to open initial connections"
                    );
                    for slot in seeded {
                        slot.close(shared.id);
                    }
                    let mut state = shared.state.lock();
                    if state.phase == PoolPhase::Initializing {
                        state.phase = PoolPhase::Created;
                    }
                    return Err(SqlpoolError::Initialization(format!(
                        "opened {} of {} connections: {}",
                        opened, min_size, e
                    )));
                }
            }
        }

        {
            let mut state = shared.state.lock();
            if state.is_closed() {
                drop(state);
                for slot in seeded {
                    slot.close(shared.id);
                }
                return Err(SqlpoolError::Closed);
            }
            state.created += seeded.len() as u64;
            state.idle.extend(seeded);
            state.phase = PoolPhase::Running;
        }

        let workers = Workers::spawn(shared)?;
        *self.handle.workers.lock() = Some(workers);

        tracing::info!(
            pool_id = %shared.id,
            min_size,
            max_size = shared.config.max_size(),
            acquire_timeout_ms = shared.config.acquire_timeout().as_millis() as u64,
            max_idle_ms = shared.config.max_idle().as_millis() as u64,
            "connection pool initialized"
        );
        Ok(())
    }

    /// Get a connection from the pool
    ///
    /// Blocks until a connection is idle. Each wait lasts at most
    /// `acquire_timeout`; under `AcquirePolicy::RetryForever` an elapsed wait
    /// just starts the next one, under `AcquirePolicy::FailAfterTimeout` it
    /// returns `SqlpoolError::Timeout`.
    pub fn acquire(&self) -> Result<Lease> {
        self.acquire_inner(None)
    }

    /// Like [`acquire`](Self::acquire), but gives up with
    /// `SqlpoolError::Cancelled` once `cancel` is cancelled.
    pub fn acquire_with_cancel(&self, cancel: &CancellationToken) -> Result<Lease> {
        self.acquire_inner(Some(cancel))
    }

    /// Acquire from async code without blocking the executor.
    ///
    /// The wait runs on tokio's blocking pool. Dropping the returned future
    /// cancels the wait.
    pub async fn acquire_async(&self) -> Result<Lease> {
        let pool = self.clone();
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();

        let result = tokio::task::spawn_blocking(move || pool.acquire_with_cancel(&cancel))
            .await
            .map_err(|e| SqlpoolError::Other(format!("acquire task failed: {}", e)));
        guard.disarm();
        result?
    }

    fn acquire_inner(&self, cancel: Option<&CancellationToken>) -> Result<Lease> {
        let shared = &self.handle.shared;
        let chunk = shared.config.acquire_timeout();

        let mut state = shared.state.lock();
        match state.phase {
            PoolPhase::Running => {}
            PoolPhase::Closed => return Err(SqlpoolError::Closed),
            PoolPhase::Created | PoolPhase::Initializing => {
                return Err(SqlpoolError::NotInitialized);
            }
        }

        state.waiting += 1;
        let outcome = loop {
            if state.is_closed() {
                break Err(SqlpoolError::Closed);
            }
            if let Some(slot) = state.idle.pop_front() {
                state.leased += 1;
                break Ok(Acquired::Idle(slot));
            }
            if shared.can_burst(&state) {
                state.bursting += 1;
                break Ok(Acquired::Create);
            }
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                break Err(SqlpoolError::Cancelled);
            }

            if !shared.wait_chunk(&mut state, chunk, cancel) {
                match shared.config.acquire_policy() {
                    AcquirePolicy::RetryForever => {
                        tracing::trace!(
                            pool_id = %shared.id,
                            chunk_ms = chunk.as_millis() as u64,
                            "no idle connection yet, waiting again"
                        );
                    }
                    AcquirePolicy::FailAfterTimeout => {
                        break Err(SqlpoolError::Timeout(format!(
                            "Timed out waiting for connection (timeout: {:?})",
                            chunk
                        )));
                    }
                }
            }
        };
        state.waiting -= 1;
        let below_floor = shared.needs_replenish(&state);
        drop(state);

        // The replenish worker parks until someone drains the store below the floor.
        if below_floor {
            shared.available.notify_all();
        }

        match outcome? {
            Acquired::Idle(slot) => Ok(Lease::new(slot, Arc::clone(shared))),
            Acquired::Create => self.create_for_lease(),
        }
    }

    /// Open a connection beyond the idle floor for the calling acquirer.
    /// The slot was reserved through `bursting` under the lock.
    fn create_for_lease(&self) -> Result<Lease> {
        let shared = &self.handle.shared;
        let created = shared.create_slot();

        let mut state = shared.state.lock();
        state.bursting -= 1;
        match created {
            Ok(slot) => {
                state.created += 1;
                if state.is_closed() {
                    state.destroyed += 1;
                    drop(state);
                    slot.close(shared.id);
                    return Err(SqlpoolError::Closed);
                }
                state.leased += 1;
                let total = state.idle.len() + state.leased;
                drop(state);

                tracing::debug!(pool_id = %shared.id, total, "opened connection above the idle floor");
                Ok(Lease::new(slot, Arc::clone(shared)))
            }
            Err(e) => {
                drop(state);
                shared.available.notify_all();
                tracing::warn!(pool_id = %shared.id, error = %e, "failed to open burst connection");
                Err(e)
            }
        }
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        self.handle.shared.state.lock().stats()
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.handle.shared.config
    }

    /// Unique id of this pool, used in log fields
    pub fn id(&self) -> Uuid {
        self.handle.shared.id
    }

    /// Whether two handles refer to the same pool
    pub fn ptr_eq(&self, other: &ConnectionPool) -> bool {
        Arc::ptr_eq(&self.handle, &other.handle)
    }

    pub fn is_closed(&self) -> bool {
        self.handle.shared.state.lock().is_closed()
    }

    /// Stop the background workers and close every idle connection.
    ///
    /// Blocked acquirers return `SqlpoolError::Closed`; leases still out close
    /// their connection when dropped. Calling this again is a no-op.
    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<PoolShared> {
        &self.handle.shared
    }
}

impl PoolHandle {
    fn shutdown(&self) {
        let drained = self.shared.begin_shutdown();
        let workers = self.workers.lock().take();
        if let Some(workers) = workers {
            workers.join(self.shared.id);
        }

        if let Some(drained) = drained {
            let closed = drained.len();
            for slot in drained {
                slot.close(self.shared.id);
            }
            tracing::info!(pool_id = %self.shared.id, closed, "connection pool shut down");
        }
    }
}

impl Drop for PoolHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
