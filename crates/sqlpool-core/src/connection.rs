//! Connection trait

use crate::{QueryResult, Result, StatementResult, Value};

/// A database connection
///
/// Connections are stateful and owned by exactly one holder at a time, so
/// every operation takes `&mut self`. Implementations block the calling
/// thread for the duration of a round-trip.
pub trait Connection: Send {
    /// Get the driver name (e.g. "mysql")
    fn driver_name(&self) -> &str;

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE)
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT)
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Switch the connection into manual-commit mode and start a transaction
    fn begin_transaction(&mut self) -> Result<()>;

    /// Commit the open transaction
    fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction
    fn rollback(&mut self) -> Result<()>;

    /// Close the connection. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

impl std::fmt::Debug for dyn Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("driver", &self.driver_name())
            .field("closed", &self.is_closed())
            .finish()
    }
}
