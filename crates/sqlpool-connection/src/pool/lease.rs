//! Scoped handle over a leased connection

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use sqlpool_core::Connection;
use uuid::Uuid;

use super::state::{PoolShared, PooledConnection};

/// A connection borrowed from the pool
///
/// Dereferences to the underlying [`Connection`]. Dropping the lease is the
/// only way a connection goes back to the pool: it is pushed to the tail of
/// the idle store and every waiter is woken. A lease that outlives the pool
/// closes its connection instead.
pub struct Lease {
    slot: Option<PooledConnection>,
    shared: Arc<PoolShared>,
}

impl Lease {
    pub(crate) fn new(slot: PooledConnection, shared: Arc<PoolShared>) -> Self {
        Self {
            slot: Some(slot),
            shared,
        }
    }

    fn slot(&self) -> &PooledConnection {
        self.slot.as_ref().expect("lease already released")
    }

    /// Id of the pool this lease belongs to
    pub fn pool_id(&self) -> Uuid {
        self.shared.id
    }
}

impl Deref for Lease {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.slot().connection.as_ref()
    }
}

impl DerefMut for Lease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.slot
            .as_mut()
            .expect("lease already released")
            .connection
            .as_mut()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.shared.release(slot);
        }
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("pool_id", &self.shared.id)
            .field("connection", &self.slot.as_ref().map(|slot| &*slot.connection))
            .finish()
    }
}
