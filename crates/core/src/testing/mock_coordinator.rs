//! Mock coordinator for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::coordinator::{Coordinator, CoordinatorError};
use crate::item::{Item, ItemStats};

/// A recorded completion report for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedDone {
    /// The item name.
    pub item: String,
    /// The statistics sent with it.
    pub stats: ItemStats,
}

/// Mock implementation of the Coordinator trait.
///
/// Provides controllable behavior for testing:
/// - Queue item names to hand out
/// - Inject claim and report errors
/// - Record done and failure reports for assertions
///
/// # Example
///
/// ```rust,ignore
/// use warrior_core::testing::MockCoordinator;
///
/// let coordinator = MockCoordinator::new();
/// coordinator.queue_items(["http://blip.tv/show/ep-1.flv"]).await;
///
/// // Run the driver...
///
/// let done = coordinator.done_reports().await;
/// assert_eq!(done.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockCoordinator {
    /// Items handed out by `claim_next`.
    queue: Arc<RwLock<VecDeque<String>>>,
    /// Errors returned by the next `claim_next` calls, before the queue.
    claim_errors: Arc<RwLock<VecDeque<CoordinatorError>>>,
    /// If set, the next `report_done` fails with this error.
    next_done_error: Arc<RwLock<Option<CoordinatorError>>>,
    upload_target: Arc<RwLock<String>>,
    done: Arc<RwLock<Vec<RecordedDone>>>,
    failed: Arc<RwLock<Vec<(String, String)>>>,
    supports_failures: AtomicBool,
}

impl Default for MockCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCoordinator {
    /// Create a new mock coordinator with an empty queue.
    pub fn new() -> Self {
        Self {
            queue: Arc::new(RwLock::new(VecDeque::new())),
            claim_errors: Arc::new(RwLock::new(VecDeque::new())),
            next_done_error: Arc::new(RwLock::new(None)),
            upload_target: Arc::new(RwLock::new(
                "rsync://localhost/warrior/:downloader/".to_string(),
            )),
            done: Arc::new(RwLock::new(Vec::new())),
            failed: Arc::new(RwLock::new(Vec::new())),
            supports_failures: AtomicBool::new(false),
        }
    }

    /// Enable or disable `/failed` support.
    pub fn with_failure_reports(self, supported: bool) -> Self {
        self.supports_failures.store(supported, Ordering::SeqCst);
        self
    }

    /// Append item names to the queue.
    pub async fn queue_items<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queue
            .write()
            .await
            .extend(names.into_iter().map(Into::into));
    }

    /// Number of items not yet claimed.
    pub async fn queued(&self) -> usize {
        self.queue.read().await.len()
    }

    /// Make the next `claim_next` call fail.
    pub async fn fail_next_claim(&self, error: CoordinatorError) {
        self.claim_errors.write().await.push_back(error);
    }

    /// Make the next `report_done` call fail.
    pub async fn fail_next_done(&self, error: CoordinatorError) {
        *self.next_done_error.write().await = Some(error);
    }

    pub async fn set_upload_target(&self, target: impl Into<String>) {
        *self.upload_target.write().await = target.into();
    }

    pub async fn done_reports(&self) -> Vec<RecordedDone> {
        self.done.read().await.clone()
    }

    /// `(item, reason)` pairs received by `report_failed`.
    pub async fn failed_reports(&self) -> Vec<(String, String)> {
        self.failed.read().await.clone()
    }
}

#[async_trait]
impl Coordinator for MockCoordinator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn claim_next(&self, _project: &str) -> Result<Option<String>, CoordinatorError> {
        if let Some(error) = self.claim_errors.write().await.pop_front() {
            return Err(error);
        }
        Ok(self.queue.write().await.pop_front())
    }

    async fn upload_target(&self, _item: &Item) -> Result<String, CoordinatorError> {
        Ok(self.upload_target.read().await.clone())
    }

    async fn report_done(&self, item: &Item, stats: &ItemStats) -> Result<(), CoordinatorError> {
        if let Some(error) = self.next_done_error.write().await.take() {
            return Err(error);
        }
        self.done.write().await.push(RecordedDone {
            item: item.name().to_string(),
            stats: stats.clone(),
        });
        Ok(())
    }

    fn supports_failure_reports(&self) -> bool {
        self.supports_failures.load(Ordering::SeqCst)
    }

    async fn report_failed(&self, item: &Item, reason: &str) -> Result<(), CoordinatorError> {
        if !self.supports_failure_reports() {
            return Err(CoordinatorError::Unsupported("failure reports"));
        }
        self.failed
            .write()
            .await
            .push((item.name().to_string(), reason.to_string()));
        Ok(())
    }
}
