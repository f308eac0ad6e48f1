//! Error types for the stage module.

use thiserror::Error;

use crate::coordinator::CoordinatorError;
use crate::gate::GateError;
use crate::supervisor::SupervisorError;
use crate::workspace::WorkspaceError;

/// Errors that end a stage attempt.
#[derive(Debug, Error)]
pub enum StageError {
    /// The process ran but exited with a code outside the accepted set.
    #[error("Process exited with unaccepted code {code}")]
    TransientProcessFailure { code: i32 },

    /// Every allowed attempt failed.
    #[error("Stage {stage} failed after {attempts} attempt(s){}", exit_suffix(.last_code))]
    RetriesExhausted {
        stage: String,
        attempts: u32,
        last_code: Option<i32>,
    },

    /// The item ran past its deadline.
    #[error("Item deadline exceeded")]
    DeadlineExceeded,

    /// Process supervision failed (spawn failure, kill on deadline, ...).
    #[error(transparent)]
    Process(#[from] SupervisorError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    /// Any other unrecoverable condition.
    #[error("{0}")]
    Fatal(String),
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(", last exit code {c}")).unwrap_or_default()
}

impl StageError {
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal(reason.into())
    }

    /// Whether another attempt of the same stage may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientProcessFailure { .. })
    }

    /// Exit code of the process behind this error, when one ran.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::TransientProcessFailure { code } => Some(*code),
            Self::RetriesExhausted { last_code, .. } => *last_code,
            _ => None,
        }
    }

    /// Short machine-readable kind, used for metrics and failure reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransientProcessFailure { .. } => "transient_process_failure",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Process(SupervisorError::Spawn { .. }) => "spawn_error",
            Self::Process(SupervisorError::DeadlineExceeded { .. }) => "deadline_exceeded",
            Self::Process(_) => "process_error",
            Self::Workspace(WorkspaceError::InvalidItemName { .. }) => "invalid_item_name",
            Self::Workspace(WorkspaceError::Relocation { .. }) => "relocation_error",
            Self::Workspace(_) => "workspace_error",
            Self::Gate(GateError::Timeout { .. }) => "gate_timeout",
            Self::Gate(_) => "gate_error",
            Self::Coordinator(_) => "coordinator_error",
            Self::Fatal(_) => "fatal",
        }
    }
}
