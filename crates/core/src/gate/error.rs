//! Error types for the gate module.

use thiserror::Error;

/// Errors that can occur while acquiring a gate.
#[derive(Debug, Error)]
pub enum GateError {
    /// No capacity was configured for this gate name.
    #[error("Unknown gate: {0}")]
    UnknownGate(String),

    /// A bounded wait expired before a slot became free.
    #[error("Timed out after {waited_secs}s waiting for gate {gate}")]
    Timeout { gate: String, waited_secs: u64 },

    /// The gate was closed while waiting.
    #[error("Gate {gate} is closed")]
    Closed { gate: String },

    /// Invalid capacity.
    #[error("Gate {gate} capacity must be at least 1")]
    InvalidCapacity { gate: String },
}
