//! Types for the supervisor module.

use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Receives output chunks as they are drained. Chunks are dropped rather than
/// awaited when the receiver falls behind.
pub type OutputSink = mpsc::Sender<Vec<u8>>;

/// A process to spawn.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Kill the process if it is still running at this instant.
    pub deadline: Option<Instant>,
}

impl ProcessRequest {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            working_dir: None,
            deadline: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }
}

/// A supervised process once its exit has been observed and its output drained.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pub pid: u32,
    /// Exit code; a signal death is reported as `128 + signal`.
    pub exit_code: Option<i32>,
    /// Combined stdout/stderr, truncated from the front to the configured limit.
    pub combined_output: Vec<u8>,
    /// Bytes discarded because of the output limit.
    pub discarded_bytes: u64,
}

impl ProcessHandle {
    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.combined_output).into_owned()
    }

    /// Whether the exit code is one of `accepted`.
    pub fn exited_with(&self, accepted: &[i32]) -> bool {
        self.exit_code.is_some_and(|code| accepted.contains(&code))
    }
}
