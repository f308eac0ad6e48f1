//! Named admission control for costly stages.
//!
//! A [`ConcurrencyGate`] bounds how many items may run a tagged stage at the
//! same time. Waiters are admitted in FIFO order. Gates are looked up by name
//! in a [`GateRegistry`] and created lazily from the capacity the operator
//! configured for that name.

mod concurrency;
mod error;
mod registry;

pub use concurrency::{ConcurrencyGate, GateStatus, GateToken};
pub use error::GateError;
pub use registry::{GateRegistry, GateSpec};

/// Gate name used by the upload stage.
pub const UPLOAD_GATE: &str = "shared:rsync_threads";
