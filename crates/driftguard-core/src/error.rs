//! Core error types for driftguard-core.
//!
//! This module defines the error hierarchy using thiserror. The decision
//! engine itself never surfaces these to callers of `evaluate` -- scoring
//! failures degrade to a pass decision -- but storage, configuration and
//! input validation report through them.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for driftguard-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Read or write failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Store is locked by another writer
    #[error("Store is locked")]
    Locked,

    /// Stored value could not be decoded
    #[error("Corrupt value for key '{key}': {message}")]
    CorruptValue { key: String, message: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load settings
    #[error("Failed to load settings from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save settings
    #[error("Failed to save settings to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid settings value
    #[error("Invalid settings value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Validation errors.
///
/// A validation failure rejects the call before any state mutates.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Hour outside 0-23
    #[error("Invalid hour {0}: must be 0-23")]
    InvalidHour(u8),

    /// Weekday outside 0-6
    #[error("Invalid weekday {0}: must be 0-6 (0 = Sunday)")]
    InvalidWeekday(u8),

    /// Empty field that must carry a value
    #[error("Empty value for required field '{0}'")]
    EmptyField(&'static str),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
