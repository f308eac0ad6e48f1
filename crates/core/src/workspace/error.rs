//! Error types for the workspace module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while preparing or finalizing a workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The item name does not have the structure needed to derive paths.
    #[error("Invalid item name {name:?}: {reason}")]
    InvalidItemName { name: String, reason: String },

    /// The artifact a previous stage should have produced is missing.
    #[error("Expected artifact not found: {path}")]
    Relocation { path: PathBuf },

    /// The item has no workspace yet.
    #[error("Item {name} has no prepared workspace")]
    NotPrepared { name: String },

    /// Failed to create a directory or placeholder file.
    #[error("Failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to move the artifact.
    #[error("Failed to move {source_path} to {destination}: {error}")]
    MoveFailed {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
