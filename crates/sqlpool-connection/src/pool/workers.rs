//! Background replenish and eviction workers

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use sqlpool_core::Result;
use uuid::Uuid;

use super::state::{PoolShared, PooledConnection};

/// Join handles for the two background threads
pub(crate) struct Workers {
    replenish: JoinHandle<()>,
    eviction: JoinHandle<()>,
}

impl Workers {
    /// Start both workers. If either thread cannot be spawned the pool is
    /// shut down, any thread already running is joined, and the error is
    /// returned.
    pub(crate) fn spawn(shared: &Arc<PoolShared>) -> Result<Self> {
        let replenish = {
            let shared = Arc::clone(shared);
            thread::Builder::new()
                .name("sqlpool-replenish".into())
                .spawn(move || replenish_loop(&shared))
        };
        let replenish = match replenish {
            Ok(handle) => handle,
            Err(e) => {
                abort_start(shared);
                return Err(e.into());
            }
        };

        let eviction = {
            let shared = Arc::clone(shared);
            thread::Builder::new()
                .name("sqlpool-eviction".into())
                .spawn(move || eviction_loop(&shared))
        };

        match eviction {
            Ok(eviction) => Ok(Self {
                replenish,
                eviction,
            }),
            Err(e) => {
                abort_start(shared);
                let _ = replenish.join();
                Err(e.into())
            }
        }
    }

    pub(crate) fn join(self, pool_id: Uuid) {
        for (name, handle) in [("replenish", self.replenish), ("eviction", self.eviction)] {
            if handle.join().is_err() {
                tracing::error!(pool_id = %pool_id, worker = name, "pool worker panicked");
            }
        }
    }
}

/// Close the pool after a worker failed to start
pub(crate) fn abort_start(shared: &PoolShared) {
    tracing::error!(pool_id = %shared.id, "failed to start pool workers");
    if let Some(drained) = shared.begin_shutdown() {
        drained.into_iter().for_each(|slot| slot.close(shared.id));
    }
}

/// Keep the idle store at `min_size`.
///
/// Sleeps on the pool condvar while the floor is met, so it only runs after
/// an acquire drains the store. Failed creations are retried after a backoff
/// rather than ending the loop.
fn replenish_loop(shared: &PoolShared) {
    let backoff = shared.config.replenish_backoff();
    let mut failures: u32 = 0;

    tracing::debug!(
        pool_id = %shared.id,
        backoff_initial_ms = backoff.initial_delay().as_millis() as u64,
        backoff_max_ms = backoff.max_delay().as_millis() as u64,
        "replenish worker started"
    );
    loop {
        {
            let mut state = shared.state.lock();
            while !state.is_closed() && !shared.needs_replenish(&state) {
                shared.available.wait(&mut state);
            }
            if state.is_closed() {
                break;
            }
            state.replenishing += 1;
        }

        let created = shared.create_slot();

        let mut state = shared.state.lock();
        state.replenishing -= 1;
        match created {
            Ok(slot) => {
                failures = 0;
                state.created += 1;
                if state.is_closed() {
                    state.destroyed += 1;
                    drop(state);
                    slot.close(shared.id);
                    break;
                }
                state.idle.push_back(slot);
                let idle = state.idle.len();
                drop(state);

                shared.available.notify_all();
                tracing::debug!(pool_id = %shared.id, idle, "replenished idle connection");
            }
            Err(e) => {
                let delay = backoff.calculate_delay(failures);
                failures = failures.saturating_add(1);
                tracing::warn!(
                    pool_id = %shared.id,
                    error = %e,
                    attempt = failures,
                    retry_in_ms = delay.as_millis() as u64,
                    "failed to replenish connection"
                );

                let retry_at = Instant::now() + delay;
                while !state.is_closed() && Instant::now() < retry_at {
                    shared.available.wait_until(&mut state, retry_at);
                }
            }
        }
    }
    tracing::debug!(pool_id = %shared.id, "replenish worker stopped");
}

/// Periodically close connections that have sat idle for too long, never
/// going below `min_size`.
fn eviction_loop(shared: &PoolShared) {
    let interval = shared.config.eviction_interval();

    tracing::debug!(pool_id = %shared.id, "eviction worker started");
    while !shared.shutdown.wait_timeout(interval) {
        let evicted = evict_expired(shared);
        if evicted.is_empty() {
            continue;
        }

        tracing::debug!(pool_id = %shared.id, count = evicted.len(), "evicting idle connections");
        for slot in evicted {
            slot.close(shared.id);
        }
    }
    tracing::debug!(pool_id = %shared.id, "eviction worker stopped");
}

/// Pop expired connections off the front of the idle store.
///
/// The store is ordered by idle time, so the scan stops at the first front
/// that is still fresh.
pub(crate) fn evict_expired(shared: &PoolShared) -> Vec<PooledConnection> {
    let max_idle = shared.config.max_idle();
    let min_size = shared.config.min_size();

    let mut state = shared.state.lock();
    if state.is_closed() {
        return Vec::new();
    }

    let mut evicted = Vec::new();
    while state.idle.len() > min_size {
        match state.idle.front() {
            Some(front) if front.idle_duration() >= max_idle => {
                if let Some(slot) = state.idle.pop_front() {
                    evicted.push(slot);
                }
            }
            _ => break,
        }
    }
    state.destroyed += evicted.len() as u64;
    evicted
}
