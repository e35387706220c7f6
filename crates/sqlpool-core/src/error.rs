//! Error types for sqlpool

use thiserror::Error;

/// Core error type for sqlpool operations
#[derive(Error, Debug)]
pub enum SqlpoolError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Pool initialization failed: {0}")]
    Initialization(String),

    #[error("Pool used before initialization")]
    NotInitialized,

    #[error("Pool already initialized")]
    AlreadyInitialized,

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Pool is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for sqlpool operations
pub type Result<T> = std::result::Result<T, SqlpoolError>;
