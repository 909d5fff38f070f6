//! Error types for the topo provisioning orchestrator.
//!
//! This module provides the error hierarchy for every stage of a run:
//! manifest handling, workspace preparation, and tool execution.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for topo.
#[derive(Debug, Error)]
pub enum TopoError {
    /// Manifest-related errors.
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Workspace preparation errors.
    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    /// Execution errors.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Manifest-related errors.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file was not found.
    #[error("Manifest file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The manifest could not be read or parsed.
    #[error("Failed to parse manifest: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Manifest validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// The manifest could not be serialized.
    #[error("Manifest serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// The manifest could not be written back.
    #[error("Failed to write manifest {path}: {message}")]
    WriteFailed {
        /// Destination path.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// Lock acquisition failed.
    #[error("Failed to acquire manifest lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// The manifest is locked by another run.
    #[error("Manifest is locked by another run (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },
}

/// Workspace preparation errors.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Cloning the template project failed.
    #[error("Failed to clone {repo}: {message}")]
    CloneFailed {
        /// Repository URL.
        repo: String,
        /// Description of the failure.
        message: String,
    },

    /// Copying the template for a provision failed.
    #[error("Failed to copy template for '{provision}': {message}")]
    CopyFailed {
        /// Provision the copy was for.
        provision: String,
        /// Description of the failure.
        message: String,
    },

    /// Removing a stale workspace failed.
    #[error("Failed to remove {path}: {message}")]
    RemoveFailed {
        /// Path that could not be removed.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },
}

/// Execution errors raised by the fan-out and aggregation stages.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// An eligible provision carried an action the tool cannot run.
    #[error("Provision '{name}' has non-executable action '{action}'")]
    NotExecutable {
        /// Provision name.
        name: String,
        /// The raw action.
        action: String,
    },

    /// Workers stopped reporting before every outcome arrived.
    #[error("Lost {missing} of {expected} execution outcomes")]
    WorkerLost {
        /// Outcomes expected.
        expected: usize,
        /// Outcomes never received.
        missing: usize,
    },
}

/// Result type alias for topo operations.
pub type Result<T> = std::result::Result<T, TopoError>;

impl TopoError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl ManifestError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl WorkspaceError {
    /// Creates a copy error for a provision.
    #[must_use]
    pub fn copy(provision: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CopyFailed {
            provision: provision.into(),
            message: message.into(),
        }
    }
}
