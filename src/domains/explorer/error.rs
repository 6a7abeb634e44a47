//! Explorer-specific error types.

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

use crate::core::security::PathSecurityError;

/// Errors that can occur while loading or rendering explorer layers.
#[derive(Debug, Error)]
pub enum ExplorerError {
    /// Country, year or resolution outside the accepted ranges.
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// A click coordinate that does not map to a cell.
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// A partition file resolved outside the data root.
    #[error(transparent)]
    PathSecurity(#[from] PathSecurityError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// The blocking load task panicked or was cancelled.
    #[error("Partition load failed: {0}")]
    Task(String),
}

impl ExplorerError {
    pub fn invalid_selection(msg: impl Into<String>) -> Self {
        Self::InvalidSelection(msg.into())
    }

    pub fn invalid_coordinate(msg: impl Into<String>) -> Self {
        Self::InvalidCoordinate(msg.into())
    }

    /// HTTP status for REST responses.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidSelection(_) | Self::InvalidCoordinate(_) => 400,
            Self::PathSecurity(_) => 403,
            _ => 500,
        }
    }
}
