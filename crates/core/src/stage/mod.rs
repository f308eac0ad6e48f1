//! Ordered per-item stage execution.
//!
//! A [`Stage`] is immutable configuration shared by every item: a name, a
//! [`StageKind`], a [`RetryPolicy`] and an action. The [`StageEngine`] runs
//! a list of stages for one item strictly in order and stops at the first
//! unrecoverable failure.

mod engine;
mod error;
mod traits;
mod types;

pub use engine::{StageEngine, StageObserver};
pub use error::StageError;
pub use traits::{FnPredicate, StageAction, StagePredicate};
pub use types::{RetryPolicy, Stage, StageKind, StageOutput};
