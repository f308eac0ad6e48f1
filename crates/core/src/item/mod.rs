//! Work items and their derived naming.
//!
//! An [`Item`] is created when the coordinator hands out a name, is mutated in
//! place by each pipeline stage, and is discarded once its outcome has been
//! reported.

mod naming;
mod types;

pub use naming::{file_base, ItemLayout, ItemName, TIMESTAMP_FORMAT};
pub use types::{Item, ItemPhase, ItemSnapshot, ItemStats, ItemStatus, StageRecord};
