//! Error types for the supervisor module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while supervising a process.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The executable could not be started (missing, not executable, ...).
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The pseudo-terminal could not be allocated or configured.
    #[error("Failed to allocate pseudo-terminal: {0}")]
    Pty(#[source] std::io::Error),

    /// Checking or waiting for process exit failed.
    #[error("Failed to wait for process {pid}: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// The caller's deadline passed; the process was killed.
    #[error("Process {pid} killed after exceeding its deadline")]
    DeadlineExceeded { pid: u32, output: Vec<u8> },
}

impl SupervisorError {
    pub fn is_spawn(&self) -> bool {
        matches!(self, Self::Spawn { .. })
    }
}
