//! Core error types for habitrack-core.
//!
//! This module defines the error hierarchy using thiserror. Request-path
//! failures (`NotFound`, `InvalidAction`, `Validation`) are surfaced to the
//! caller as-is; storage failures are wrapped in [`DatabaseError`].

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for habitrack-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The habit does not exist or is owned by another user.
    #[error("Habit {habit_id} not found")]
    NotFound { habit_id: i64 },

    /// Unrecognized timer action string.
    #[error("Invalid timer action: '{0}'")]
    InvalidAction(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unknown IANA timezone name
    #[error("Unknown timezone: '{0}'")]
    Timezone(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A concurrent writer changed the habit between read and write.
    #[error("Habit {habit_id} was modified concurrently (expected version {expected})")]
    Conflict { habit_id: i64, expected: i64 },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Habit name is empty
    #[error("Habit name must not be empty")]
    EmptyName,

    /// Target is negative or not a finite number
    #[error("Invalid target {0}: must be a finite number >= 0")]
    InvalidTarget(f64),

    /// Unknown goal type
    #[error("Unknown goal type '{0}' (expected boolean, numeric or time)")]
    UnknownGoalType(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}
