//! Error types for pkgstore
//!
//! All modules use `StoreResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// All errors that can occur in the store controller
#[derive(Error, Debug)]
pub enum StoreError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown package import method: {0}")]
    UnknownImportMethod(String),

    // Ingestion errors
    #[error("Failed to add {path} to the store: {source}")]
    Ingest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Materialization errors
    #[error("Failed to import package into {dest}: {reason}")]
    ImportFailed { dest: PathBuf, reason: String },

    #[error("Copy-on-write clone is not supported here: {0}")]
    CloneUnsupported(String),

    // Index errors
    #[error("Files index {path} is unreadable: {reason}")]
    IndexCorrupt { path: PathBuf, reason: String },

    #[error("Failed to write files index {path}: {source}")]
    IndexWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Collaborator errors
    #[error("No package requester configured for this store controller")]
    RequesterUnavailable,

    #[error("Store controller is closed")]
    Closed,

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl StoreError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an import failure for a destination
    pub fn import_failed(dest: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ImportFailed {
            dest: dest.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if error is retryable
    ///
    /// Materialization failures may succeed with a different strategy; the
    /// caller decides whether to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ImportFailed { .. } | Self::CloneUnsupported(_)
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CloneUnsupported(_) => {
                Some("Set store.package_import_method to \"auto\" or \"copy\"")
            }
            Self::IndexCorrupt { .. } => Some(
                "Remove the index file or set store.recover_corrupt_index = true to rebuild it",
            ),
            Self::RequesterUnavailable => Some("Configure a resolver before requesting packages"),
            Self::UnknownImportMethod(_) => Some("Use one of: auto, hardlink, copy, clone"),
            _ => None,
        }
    }
}
