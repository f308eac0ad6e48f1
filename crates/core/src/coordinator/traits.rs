//! Coordinator trait.

use async_trait::async_trait;

use crate::item::{Item, ItemStats};

use super::error::CoordinatorError;

/// Source of items and sink for their outcomes.
///
/// Reporting is at-least-once: an item whose report is lost is handed out
/// again and re-processed.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &str;

    /// Claims the next item name for `project`. `None` when nothing is queued.
    async fn claim_next(&self, project: &str) -> Result<Option<String>, CoordinatorError>;

    /// Asks where the item's artifact should be uploaded.
    async fn upload_target(&self, item: &Item) -> Result<String, CoordinatorError>;

    /// Reports a completed item with its statistics.
    async fn report_done(&self, item: &Item, stats: &ItemStats) -> Result<(), CoordinatorError>;

    /// Whether [`report_failed`](Self::report_failed) is available.
    fn supports_failure_reports(&self) -> bool {
        false
    }

    /// Reports a failed item.
    async fn report_failed(&self, _item: &Item, _reason: &str) -> Result<(), CoordinatorError> {
        Err(CoordinatorError::Unsupported("failure reports"))
    }
}
