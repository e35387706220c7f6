//! Pool tests against a live MySQL server
//!
//! Skipped unless `SQLPOOL_TEST_MYSQL_HOST` is set. Also reads
//! `SQLPOOL_TEST_MYSQL_PORT`, `SQLPOOL_TEST_MYSQL_USER`,
//! `SQLPOOL_TEST_MYSQL_PASSWORD` and `SQLPOOL_TEST_MYSQL_DATABASE`.

use std::thread;

use pretty_assertions::assert_eq;
use sqlpool_connection::{ConnectionParams, ConnectionPool, PoolConfig};
use sqlpool_core::{Connection, Transaction, Value};
use sqlpool_driver_mysql::{MySqlConnection, MySqlConnectionFactory};

fn test_params() -> Option<ConnectionParams> {
    let host = std::env::var("SQLPOOL_TEST_MYSQL_HOST").ok()?;
    let port = std::env::var("SQLPOOL_TEST_MYSQL_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3306);
    let user = std::env::var("SQLPOOL_TEST_MYSQL_USER").unwrap_or_else(|_| "root".into());

    let mut params = ConnectionParams::new(host, port, user);
    if let Ok(password) = std::env::var("SQLPOOL_TEST_MYSQL_PASSWORD") {
        params = params.with_password(password);
    }
    let database = std::env::var("SQLPOOL_TEST_MYSQL_DATABASE").unwrap_or_else(|_| "test".into());
    Some(params.with_database(database))
}

macro_rules! require_mysql {
    () => {
        match test_params() {
            Some(params) => params,
            None => {
                eprintln!("SQLPOOL_TEST_MYSQL_HOST not set, skipping");
                return;
            }
        }
    };
}

#[test]
fn test_connect_and_query() {
    let params = require_mysql!();
    let mut conn = MySqlConnection::connect(&params).expect("connect");

    let result = conn
        .query("SELECT ? + 1 AS answer", &[Value::Int64(41)])
        .expect("query");
    assert_eq!(result.scalar().and_then(Value::as_i64), Some(42));
    assert!(conn.connection_id().is_some());

    conn.close().expect("close");
    assert!(conn.is_closed());
}

#[test]
fn test_transaction_rollback_and_commit() {
    let params = require_mysql!();
    let pool = ConnectionPool::start(PoolConfig::new(1, 2), MySqlConnectionFactory::new(params))
        .expect("start");

    let mut lease = pool.acquire().expect("acquire");
    lease
        .execute(
            "CREATE TEMPORARY TABLE sqlpool_accounts (id INT PRIMARY KEY, balance INT)",
            &[],
        )
        .expect("create");

    {
        let mut tx = Transaction::begin(&mut *lease).expect("begin");
        tx.execute("INSERT INTO sqlpool_accounts VALUES (?, ?)", &[Value::Int64(1), Value::Int64(10)])
            .expect("insert");
    }
    let count = lease
        .query("SELECT COUNT(*) FROM sqlpool_accounts", &[])
        .expect("count");
    assert_eq!(count.scalar().and_then(Value::as_i64), Some(0));

    let mut tx = Transaction::begin(&mut *lease).expect("begin");
    let inserted = tx
        .execute("INSERT INTO sqlpool_accounts VALUES (?, ?)", &[Value::Int64(2), Value::Int64(20)])
        .expect("insert");
    assert_eq!(inserted.affected_rows, 1);
    tx.commit().expect("commit");

    let count = lease
        .query("SELECT COUNT(*) FROM sqlpool_accounts", &[])
        .expect("count");
    assert_eq!(count.scalar().and_then(Value::as_i64), Some(1));
}

#[test]
fn test_pool_shares_connections_between_threads() {
    let params = require_mysql!();
    let pool = ConnectionPool::start(PoolConfig::new(2, 4), MySqlConnectionFactory::new(params))
        .expect("start");

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    let mut lease = pool.acquire().expect("acquire");
                    let result = lease.query("SELECT 1", &[]).expect("query");
                    assert_eq!(result.scalar().and_then(Value::as_i64), Some(1));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker");
    }

    pool.shutdown();
    assert_eq!(pool.stats().idle(), 0);
}

#[tokio::test]
async fn test_pool_used_from_async_context() {
    let params = require_mysql!();
    let pool = ConnectionPool::start(PoolConfig::new(1, 2), MySqlConnectionFactory::new(params))
        .expect("start");

    let mut lease = pool.acquire_async().await.expect("acquire");
    let result = lease.query("SELECT ? AS n", &[Value::Int64(7)]).expect("query");
    assert_eq!(result.scalar().and_then(Value::as_i64), Some(7));
    drop(lease);

    // Last handle dropped inside the runtime closes the idle connections.
    drop(pool);
}
