//! Pool factory for MySQL connections

use sqlpool_connection::{ConnectionFactory, ConnectionParams};
use sqlpool_core::{Connection, Result};

use crate::MySqlConnection;

/// Opens a new [`MySqlConnection`] with fixed params each time the pool asks
#[derive(Debug, Clone)]
pub struct MySqlConnectionFactory {
    params: ConnectionParams,
}

impl MySqlConnectionFactory {
    pub fn new(params: ConnectionParams) -> Self {
        tracing::debug!(address = %params.address(), "MySQL connection factory created");
        Self { params }
    }
}

impl ConnectionFactory for MySqlConnectionFactory {
    fn create(&self) -> Result<Box<dyn Connection>> {
        let conn = MySqlConnection::connect(&self.params)?;
        Ok(Box::new(conn))
    }
}
