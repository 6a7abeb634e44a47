//! Database error types.

use thiserror::Error;

/// Errors that can occur while resolving credentials or talking to PostgreSQL.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Required connection settings are absent.
    #[error("Missing DB credentials: {0}")]
    MissingCredentials(String),

    /// The configured schema is not a plain SQL identifier.
    #[error("Invalid schema name '{0}': expected a plain SQL identifier")]
    InvalidSchema(String),

    /// The credential secret could not be fetched or parsed.
    #[error("Secret resolution failed: {0}")]
    Secret(String),

    /// Connecting took longer than the configured timeout.
    #[error("Connection to {host}:{port} timed out after {seconds}s")]
    ConnectTimeout { host: String, port: u16, seconds: u64 },

    /// Error reported by the driver.
    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Create a new "missing credentials" error.
    pub fn missing_credentials(msg: impl Into<String>) -> Self {
        Self::MissingCredentials(msg.into())
    }

    /// Create a new secret resolution error.
    pub fn secret(msg: impl Into<String>) -> Self {
        Self::Secret(msg.into())
    }
}
