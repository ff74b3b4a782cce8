//! Error types for techradar.
//!
//! This module defines all error types used throughout the techradar crate.
//! The catalog-level variants (`Conflict`, `NotFound`, `InvalidInput`,
//! `ConcurrentModification`) are the outcomes callers are expected to map to
//! user-facing responses; everything else is an internal failure.

use std::path::PathBuf;
use thiserror::Error;

use crate::technology::UnknownVariant;

/// The main error type for techradar operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Catalog Errors ===
    /// A technology with this name already exists.
    #[error("Technology with the name '{name}' already exists")]
    Conflict {
        /// The duplicated name.
        name: String,
    },

    /// No technology with this name exists.
    #[error("Technology with the name '{name}' does not exist")]
    NotFound {
        /// The missing name.
        name: String,
    },

    /// The request violates the data model.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the violation.
        message: String,
    },

    /// An update kept losing the race against other writers.
    #[error("technology '{name}' was modified concurrently; gave up after {attempts} attempts")]
    ConcurrentModification {
        /// The contended technology.
        name: String,
        /// How many read-modify-write rounds were tried.
        attempts: u32,
    },

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for techradar operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<UnknownVariant> for Error {
    fn from(err: UnknownVariant) -> Self {
        Self::InvalidInput {
            message: err.to_string(),
        }
    }
}

impl Error {
    /// Create a conflict error for `name`.
    #[must_use]
    pub fn conflict(name: impl Into<String>) -> Self {
        Self::Conflict { name: name.into() }
    }

    /// Create a not-found error for `name`.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create an invalid-input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error reports a duplicate name or a lost update race.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::ConcurrentModification { .. }
        )
    }

    /// Check if this error reports a missing technology.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error reports a data-model violation.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }
}
