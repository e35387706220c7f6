//! MySQL/MariaDB connections for sqlpool
//!
//! [`MySqlConnection`] is a synchronous [`sqlpool_core::Connection`] over a
//! single `mysql_async` connection; [`MySqlConnectionFactory`] plugs it into a
//! [`sqlpool_connection::ConnectionPool`].

mod connection;
mod convert;
mod factory;

pub use connection::MySqlConnection;
pub use factory::MySqlConnectionFactory;
