//! Database connection parameters

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where and as whom to connect
///
/// The password is never serialized and is redacted in `Debug` output, so
/// params can be logged or written to a config file safely.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Server host name or address
    pub host: String,

    /// Server port
    pub port: u16,

    /// User name to authenticate as
    pub user: String,

    #[serde(skip_serializing, default)]
    pub password: Option<String>,

    /// Default database (schema) to select after connecting
    pub database: Option<String>,
}

impl ConnectionParams {
    /// Create params for `user@host:port` with no password or database
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: None,
            database: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// `host:port`, for log fields and error messages
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self::new("127.0.0.1", 3306, "root")
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_params_builder() {
        let params = ConnectionParams::new("db.internal", 3307, "app")
            .with_password("hunter2")
            .with_database("orders");

        assert_eq!(params.address(), "db.internal:3307");
        assert_eq!(params.password.as_deref(), Some("hunter2"));
        assert_eq!(params.database.as_deref(), Some("orders"));
    }

    #[test]
    fn test_password_not_serialized() {
        let params = ConnectionParams::default().with_password("hunter2");
        let json = serde_json::to_string(&params).expect("serialize");
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("password"));

        let restored: ConnectionParams = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored.password, None);
        assert_eq!(restored.host, "127.0.0.1");
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let params = ConnectionParams::default().with_password("hunter2");
        let debug = format!("{:?}", params);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
