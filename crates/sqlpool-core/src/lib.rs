//! sqlpool core - shared abstractions for pooled database connections
//!
//! This crate provides the types every other sqlpool crate depends on:
//!
//! - `Connection` - the capability a pooled database connection exposes
//! - `Transaction` - scoped transaction guard over a borrowed connection
//! - Common result types like `Value`, `Row` and `QueryResult`
//! - `SqlpoolError` and the crate-wide `Result` alias

mod connection;
mod error;
pub mod transaction;
mod types;

pub use connection::*;
pub use error::*;
pub use transaction::Transaction;
pub use types::*;
