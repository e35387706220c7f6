//! MySQL connection implementation

use std::future::Future;
use std::sync::{OnceLock, mpsc};
use std::time::Instant;

use mysql_async::consts::ColumnType;
use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder, Row as MySqlRow};
use sqlpool_connection::ConnectionParams;
use sqlpool_core::{
    ColumnMeta, Connection, QueryResult, Result, Row, SqlpoolError, StatementResult, Value,
};

use crate::convert::{bind_params, mysql_value_to_value};

/// Tokio runtime that drives every MySQL connection in the process.
///
/// mysql_async is async-only and spawns onto the ambient Tokio runtime, while
/// pooled connections are used from plain threads and from async callers.
/// Every operation is spawned here and the caller waits on a channel.
fn get_mysql_runtime() -> &'static tokio::runtime::Runtime {
    static RUNTIME: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .thread_name("sqlpool-mysql-runtime")
            .build()
            .expect("Failed to create Tokio runtime for MySQL driver")
    })
}

/// Run `future` on the MySQL runtime and park the calling thread until it
/// completes. Unlike `Runtime::block_on` this works from inside another
/// Tokio runtime.
pub(crate) fn dispatch<F>(future: F) -> Result<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    get_mysql_runtime().spawn(async move {
        let _ = tx.send(future.await);
    });
    rx.recv()
        .map_err(|_| SqlpoolError::Connection("MySQL task failed".into()))
}

/// A single MySQL connection
///
/// Methods block the calling thread until the server answers. Calling them
/// from async code is allowed but stalls that executor thread for the round
/// trip; prefer `tokio::task::spawn_blocking` for long statements.
pub struct MySqlConnection {
    conn: Option<Conn>,
    address: String,
}

impl MySqlConnection {
    /// Connect to a MySQL server
    pub fn connect(params: &ConnectionParams) -> Result<Self> {
        let address = params.address();
        tracing::debug!(address = %address, user = %params.user, database = ?params.database, "connecting to MySQL");

        let opts = OptsBuilder::default()
            .ip_or_hostname(params.host.clone())
            .tcp_port(params.port)
            .user(Some(params.user.clone()))
            .pass(params.password.clone())
            .db_name(params.database.clone());

        let conn = dispatch(Conn::new(opts))?.map_err(|e| {
            SqlpoolError::Connection(format!("Failed to connect to MySQL at {}: {}", address, e))
        })?;

        tracing::debug!(address = %address, connection_id = conn.id(), "MySQL connection established");
        Ok(Self {
            conn: Some(conn),
            address,
        })
    }

    /// Server-side connection id, if the connection is still open
    pub fn connection_id(&self) -> Option<u32> {
        self.conn.as_ref().map(Conn::id)
    }

    fn take_conn(&mut self) -> Result<Conn> {
        self.conn
            .take()
            .ok_or_else(|| SqlpoolError::Connection("MySQL connection is closed".into()))
    }

    /// Move the connection into a task on the MySQL runtime and put it back
    /// once `op` hands it over again.
    fn with_conn<T, F, Fut>(&mut self, context: &str, op: F) -> Result<T>
    where
        F: FnOnce(Conn) -> Fut,
        Fut: Future<Output = (Conn, mysql_async::Result<T>)> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.take_conn()?;
        let (conn, result) = dispatch(op(conn))?;
        self.conn = Some(conn);
        result.map_err(|e| self.map_error(context, e))
    }

    /// Map a driver error, dropping the connection if it can no longer be used
    fn map_error(&mut self, context: &str, error: mysql_async::Error) -> SqlpoolError {
        if matches!(error, mysql_async::Error::Io(_) | mysql_async::Error::Driver(_)) {
            tracing::warn!(address = %self.address, error = %error, "MySQL connection lost");
            self.conn = None;
            return SqlpoolError::Connection(format!("{}: {}", context, error));
        }
        SqlpoolError::Query(format!("{}: {}", context, error))
    }

    fn run_statement(&mut self, sql: &'static str, context: &str) -> Result<()> {
        self.with_conn(context, move |mut conn| async move {
            let result = conn.query_drop(sql).await;
            (conn, result)
        })
    }
}

impl Connection for MySqlConnection {
    fn driver_name(&self) -> &str {
        "mysql"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let final_sql = bind_params(sql, params)?;

        let result = self.with_conn("Failed to execute statement", move |mut conn| async move {
            let result = conn
                .query_drop(final_sql)
                .await
                .map(|()| StatementResult {
                    affected_rows: conn.affected_rows(),
                    last_insert_id: conn.last_insert_id(),
                });
            (conn, result)
        })?;

        tracing::debug!(affected_rows = result.affected_rows, "statement executed");
        Ok(result)
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let start_time = Instant::now();
        let final_sql = bind_params(sql, params)?;

        let mysql_rows = self.with_conn("Failed to execute query", move |mut conn| async move {
            let rows = conn.query::<MySqlRow, _>(final_sql).await;
            (conn, rows)
        })?;

        let mut columns = Vec::new();
        let mut column_names = Vec::new();
        let mut column_types = Vec::new();
        if let Some(first_row) = mysql_rows.first() {
            for (idx, col) in first_row.columns_ref().iter().enumerate() {
                let name = col.name_str().to_string();
                column_names.push(name.clone());
                column_types.push(col.column_type());
                columns.push(ColumnMeta {
                    name,
                    data_type: format!("{:?}", col.column_type()),
                    nullable: true,
                    ordinal: idx,
                });
            }
        }

        let rows = mysql_rows
            .into_iter()
            .map(|mysql_row| {
                let values = (0..columns.len())
                    .map(|idx| {
                        let mysql_val: mysql_async::Value =
                            mysql_row.get(idx).unwrap_or(mysql_async::Value::NULL);
                        let col_type = column_types
                            .get(idx)
                            .copied()
                            .unwrap_or(ColumnType::MYSQL_TYPE_STRING);
                        mysql_value_to_value(mysql_val, col_type)
                    })
                    .collect();
                Row::new(column_names.clone(), values)
            })
            .collect::<Vec<_>>();

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::debug!(
            row_count = rows.len(),
            execution_time_ms = execution_time_ms,
            "query executed successfully"
        );

        Ok(QueryResult {
            id: uuid::Uuid::new_v4(),
            columns,
            rows,
            execution_time_ms,
        })
    }

    fn begin_transaction(&mut self) -> Result<()> {
        tracing::debug!("beginning MySQL transaction");
        self.run_statement("START TRANSACTION", "Failed to begin transaction")
    }

    fn commit(&mut self) -> Result<()> {
        self.run_statement("COMMIT", "Failed to commit transaction")
    }

    fn rollback(&mut self) -> Result<()> {
        self.run_statement("ROLLBACK", "Failed to roll back transaction")
    }

    fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        tracing::debug!(address = %self.address, "closing MySQL connection");
        dispatch(conn.disconnect())?.map_err(|e| {
            SqlpoolError::Connection(format!("Failed to close MySQL connection: {}", e))
        })
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dispatch_from_plain_thread() {
        assert_eq!(dispatch(async { 40 + 2 }).expect("dispatch"), 42);
    }

    #[tokio::test]
    async fn test_dispatch_inside_current_thread_runtime() {
        let value = dispatch(async {
            tokio::task::yield_now().await;
            "done"
        })
        .expect("dispatch");
        assert_eq!(value, "done");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dispatch_reports_panicked_task() {
        let result = dispatch(async {
            let rows: Vec<u32> = Vec::new();
            rows[0]
        });
        assert!(matches!(result, Err(SqlpoolError::Connection(_))));
    }
}
