//! Per-item working directories.
//!
//! [`WorkspaceManager::prepare`] allocates a fresh `{dataDir}/{fileId}`
//! directory and reserves the artifact name inside it;
//! [`WorkspaceManager::finalize`] moves the artifact into the shared data
//! directory and removes the working directory.

mod error;
mod manager;

pub use error::WorkspaceError;
pub use manager::WorkspaceManager;
