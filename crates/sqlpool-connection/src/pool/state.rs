//! Shared pool state guarded by the pool lock

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use sqlpool_core::{Connection, Result, SqlpoolError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::config::{GrowthPolicy, PoolConfig};
use super::pool::ConnectionFactory;
use super::shutdown::ShutdownSignal;
use super::stats::PoolStats;

/// How often a cancellable wait re-checks its token
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A connection slot with its bookkeeping.
///
/// Slots move between the idle store and a `Lease`; nothing else holds the
/// connection, so there is never more than one owner.
pub(crate) struct PooledConnection {
    pub(crate) connection: Box<dyn Connection>,
    created_at: Instant,
    idle_since: Instant,
}

impl PooledConnection {
    fn new(connection: Box<dyn Connection>) -> Self {
        let now = Instant::now();
        Self {
            connection,
            created_at: now,
            idle_since: now,
        }
    }

    /// Mark the slot as idle from now on. Called exactly when it re-enters
    /// the idle store.
    pub(crate) fn refresh_idle(&mut self) {
        self.idle_since = Instant::now();
    }

    pub(crate) fn idle_duration(&self) -> Duration {
        self.idle_since.elapsed()
    }

    pub(crate) fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Close the underlying connection, logging failures
    pub(crate) fn close(mut self, pool_id: Uuid) {
        if let Err(e) = self.connection.close() {
            tracing::warn!(pool_id = %pool_id, error = %e, "failed to close pooled connection");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PoolPhase {
    /// Constructed, `initialize` not called yet
    Created,
    /// `initialize` is seeding the idle store
    Initializing,
    Running,
    Closed,
}

pub(crate) struct PoolState {
    pub(crate) phase: PoolPhase,
    /// FIFO: pop from the front, push to the back. The front is always the
    /// longest-idle connection.
    pub(crate) idle: VecDeque<PooledConnection>,
    pub(crate) leased: usize,
    /// Creations in flight on behalf of the replenish worker
    pub(crate) replenishing: usize,
    /// Creations in flight on behalf of acquirers (`GrowthPolicy::BurstToMax`)
    pub(crate) bursting: usize,
    pub(crate) waiting: usize,
    pub(crate) created: u64,
    pub(crate) destroyed: u64,
}

impl PoolState {
    fn new() -> Self {
        Self {
            phase: PoolPhase::Created,
            idle: VecDeque::new(),
            leased: 0,
            replenishing: 0,
            bursting: 0,
            waiting: 0,
            created: 0,
            destroyed: 0,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.phase == PoolPhase::Closed
    }

    /// Live connections plus creations in flight
    fn committed(&self) -> usize {
        self.idle.len() + self.leased + self.replenishing + self.bursting
    }

    pub(crate) fn stats(&self) -> PoolStats {
        PoolStats::new(
            self.idle.len(),
            self.leased,
            self.waiting,
            self.created,
            self.destroyed,
        )
    }
}

/// Everything the pool handle, leases and background workers share
pub(crate) struct PoolShared {
    pub(crate) id: Uuid,
    pub(crate) config: PoolConfig,
    factory: Arc<dyn ConnectionFactory>,
    pub(crate) state: Mutex<PoolState>,
    /// Shared by acquirers and the replenish worker. Always broadcast; every
    /// waiter re-checks its own predicate under the lock.
    pub(crate) available: Condvar,
    pub(crate) shutdown: ShutdownSignal,
}

impl PoolShared {
    pub(crate) fn new(config: PoolConfig, factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            factory,
            state: Mutex::new(PoolState::new()),
            available: Condvar::new(),
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Create a connection through the factory. Never called with the lock held.
    pub(crate) fn create_slot(&self) -> Result<PooledConnection> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.factory.create())) {
            Ok(Ok(connection)) => Ok(PooledConnection::new(connection)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SqlpoolError::Connection(
                "connection factory panicked".into(),
            )),
        }
    }

    /// Whether the replenish worker should create another connection
    pub(crate) fn needs_replenish(&self, state: &PoolState) -> bool {
        let below_floor = state.idle.len() + state.replenishing < self.config.min_size();
        match self.config.growth_policy() {
            GrowthPolicy::FloorOnly => below_floor,
            GrowthPolicy::BurstToMax => below_floor && state.committed() < self.config.max_size(),
        }
    }

    /// Whether an acquirer facing an empty idle store may create its own connection
    pub(crate) fn can_burst(&self, state: &PoolState) -> bool {
        self.config.growth_policy() == GrowthPolicy::BurstToMax
            && state.committed() < self.config.max_size()
    }

    /// Wait for up to one acquire chunk.
    ///
    /// Returns `false` only if the chunk elapsed and nothing an acquirer acts
    /// on has changed; `true` means the caller should re-run its checks.
    pub(crate) fn wait_chunk(
        &self,
        state: &mut MutexGuard<'_, PoolState>,
        chunk: Duration,
        cancel: Option<&CancellationToken>,
    ) -> bool {
        let deadline = Instant::now() + chunk;
        loop {
            if !state.idle.is_empty()
                || state.is_closed()
                || is_cancelled(cancel)
                || self.can_burst(state)
            {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let wake_at = match cancel {
                Some(_) => deadline.min(now + CANCEL_POLL_INTERVAL),
                None => deadline,
            };
            self.available.wait_until(state, wake_at);
        }
    }

    /// Return a leased slot to the idle store
    pub(crate) fn release(&self, mut slot: PooledConnection) {
        let mut state = self.state.lock();
        state.leased = state.leased.saturating_sub(1);

        if state.is_closed() || slot.connection.is_closed() {
            state.destroyed += 1;
            drop(state);
            self.available.notify_all();
            tracing::debug!(
                pool_id = %self.id,
                age_ms = slot.age().as_millis() as u64,
                "discarding returned connection"
            );
            slot.close(self.id);
            return;
        }

        slot.refresh_idle();
        state.idle.push_back(slot);
        let idle = state.idle.len();
        drop(state);

        self.available.notify_all();
        tracing::trace!(pool_id = %self.id, idle, "connection returned to pool");
    }

    /// Mark the pool closed and take every idle connection out of the store.
    ///
    /// Returns `None` if the pool was already closed.
    pub(crate) fn begin_shutdown(&self) -> Option<Vec<PooledConnection>> {
        let mut state = self.state.lock();
        if state.is_closed() {
            return None;
        }
        state.phase = PoolPhase::Closed;
        let drained: Vec<_> = state.idle.drain(..).collect();
        state.destroyed += drained.len() as u64;
        drop(state);

        self.available.notify_all();
        self.shutdown.fire();
        Some(drained)
    }
}

fn is_cancelled(cancel: Option<&CancellationToken>) -> bool {
    cancel.is_some_and(CancellationToken::is_cancelled)
}
