//! Scoped transactions over a borrowed connection

use crate::{Connection, QueryResult, Result, SqlpoolError, StatementResult, Value};

/// A transaction on a borrowed connection.
///
/// The transaction is rolled back when the guard is dropped without an
/// explicit [`commit`](Transaction::commit) or
/// [`rollback`](Transaction::rollback), so early returns and `?` never leave
/// a connection in manual-commit mode with pending work.
///
/// # Example
/// ```ignore
/// let mut lease = pool.acquire()?;
/// let mut tx = Transaction::begin(&mut *lease)?;
/// tx.execute("UPDATE accounts SET balance = balance - 10 WHERE id = 1", &[])?;
/// tx.execute("UPDATE accounts SET balance = balance + 10 WHERE id = 2", &[])?;
/// tx.commit()?;
/// ```
pub struct Transaction<'c> {
    conn: &'c mut dyn Connection,
    finished: bool,
}

impl<'c> Transaction<'c> {
    /// Start a transaction on `conn`
    pub fn begin(conn: &'c mut dyn Connection) -> Result<Self> {
        conn.begin_transaction()?;
        tracing::debug!(driver = %conn.driver_name(), "transaction started");
        Ok(Self {
            conn,
            finished: false,
        })
    }

    /// Execute a statement within the transaction
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.ensure_open()?;
        self.conn.execute(sql, params)
    }

    /// Execute a query within the transaction
    pub fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.ensure_open()?;
        self.conn.query(sql, params)
    }

    /// Commit the transaction
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.conn.commit()
    }

    /// Roll back the transaction
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.conn.rollback()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.conn.is_closed() {
            return Err(SqlpoolError::Transaction(
                "Transaction connection no longer available".into(),
            ));
        }
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished || self.conn.is_closed() {
            return;
        }
        tracing::warn!("transaction dropped without commit or rollback, rolling back");
        if let Err(e) = self.conn.rollback() {
            tracing::error!(error = %e, "failed to roll back abandoned transaction");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingConnection {
        log: Vec<&'static str>,
        closed: bool,
    }

    impl Connection for RecordingConnection {
        fn driver_name(&self) -> &str {
            "recording"
        }

        fn execute(&mut self, _sql: &str, _params: &[Value]) -> Result<StatementResult> {
            self.log.push("execute");
            Ok(StatementResult {
                affected_rows: 1,
                last_insert_id: None,
            })
        }

        fn query(&mut self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
            self.log.push("query");
            Ok(QueryResult::empty())
        }

        fn begin_transaction(&mut self) -> Result<()> {
            self.log.push("begin");
            Ok(())
        }

        fn commit(&mut self) -> Result<()> {
            self.log.push("commit");
            Ok(())
        }

        fn rollback(&mut self) -> Result<()> {
            self.log.push("rollback");
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.closed
        }
    }

    #[test]
    fn test_commit_does_not_roll_back() {
        let mut conn = RecordingConnection::default();
        {
            let mut tx = Transaction::begin(&mut conn).unwrap();
            tx.execute("INSERT INTO t VALUES (1)", &[]).unwrap();
            tx.commit().unwrap();
        }
        assert_eq!(conn.log, vec!["begin", "execute", "commit"]);
    }

    #[test]
    fn test_drop_rolls_back_pending_transaction() {
        let mut conn = RecordingConnection::default();
        {
            let mut tx = Transaction::begin(&mut conn).unwrap();
            tx.query("SELECT 1", &[]).unwrap();
        }
        assert_eq!(conn.log, vec!["begin", "query", "rollback"]);
    }

    #[test]
    fn test_closed_connection_rejects_statements() {
        let mut conn = RecordingConnection::default();
        let mut tx = Transaction::begin(&mut conn).unwrap();
        tx.conn.close().unwrap();
        let err = tx.execute("DELETE FROM t", &[]).unwrap_err();
        assert!(matches!(err, SqlpoolError::Transaction(_)));
    }
}
