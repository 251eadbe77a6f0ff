//! Core error types for wordgate-core.
//!
//! Every failure in the engine is a value returned to the caller. The
//! taxonomy follows the three outcomes a learner-facing action can hit:
//! the thing asked for does not exist, the action is not allowed in the
//! current state, or stored state contradicts itself.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for wordgate-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Unknown learner, unit, test or question. No state was mutated.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The action is not allowed in the current state (locked unit,
    /// empty quiz, no lives left, insufficient funds, ...).
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Stored state contradicts an invariant and could not be healed.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

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
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        CoreError::PreconditionFailed(message.into())
    }

    /// Returns `true` for errors caused by the request rather than by
    /// storage or configuration.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            CoreError::NotFound { .. } | CoreError::PreconditionFailed(_)
        )
    }
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

    /// Database is locked by another writer
    #[error("Database is locked")]
    Locked,
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

    /// Unknown or unparsable key
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors for catalog and test-table input.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Two catalog entries share an id
    #[error("Duplicate {collection} id: {id}")]
    DuplicateId { collection: String, id: i64 },

    /// Two units claim the same position in the global order
    #[error("Units {first} and {second} share order index {order_index}")]
    DuplicateOrder {
        order_index: i64,
        first: i64,
        second: i64,
    },

    /// Two checkpoint tests share a trigger
    #[error("More than one test for {grade_level} after {after_units_completed} units")]
    DuplicateTrigger {
        grade_level: String,
        after_units_completed: u32,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
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

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
