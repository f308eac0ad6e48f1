//! Scripted stage action for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::item::Item;
use crate::stage::{StageAction, StageError, StageOutput};

/// One scripted result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    /// Return this result code.
    Code(i32),
    /// Fail with `StageError::TransientProcessFailure`.
    Transient(i32),
    /// Fail with `StageError::Fatal`.
    Fatal(String),
}

/// Mock implementation of the StageAction trait.
///
/// Provides controllable behavior for testing:
/// - Scripted outcomes, consumed one per call (success once exhausted)
/// - Simulated work duration
/// - Call counting and peak concurrency tracking
///
/// # Example
///
/// ```rust,ignore
/// use warrior_core::testing::MockAction;
///
/// let action = Arc::new(MockAction::with_codes(vec![1, 1, 0]));
/// let stage = Stage::simple("download", action.clone())
///     .with_retry(RetryPolicy::attempts(5));
///
/// engine.execute(&mut item, &[stage]).await?;
/// assert_eq!(action.calls(), 3);
/// ```
#[derive(Debug, Default)]
pub struct MockAction {
    script: Arc<RwLock<VecDeque<MockOutcome>>>,
    delay: Duration,
    calls: AtomicU32,
    active: AtomicUsize,
    max_active: AtomicUsize,
    /// Names of the items this action ran for, in call order.
    seen: Arc<RwLock<Vec<String>>>,
}

impl MockAction {
    /// An action that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// An action returning `codes` in order.
    pub fn with_codes(codes: Vec<i32>) -> Self {
        Self::scripted(codes.into_iter().map(MockOutcome::Code).collect())
    }

    pub fn scripted(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            script: Arc::new(RwLock::new(outcomes.into())),
            ..Self::default()
        }
    }

    /// Makes every call take `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were running at once.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub async fn seen_items(&self) -> Vec<String> {
        self.seen.read().await.clone()
    }
}

/// Decrements the active count even when the call is cancelled.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StageAction for MockAction {
    async fn run(&self, item: &mut Item) -> Result<StageOutput, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = ActiveGuard(&self.active);
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.seen.write().await.push(item.name().to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let outcome = self.script.write().await.pop_front();
        match outcome.unwrap_or(MockOutcome::Code(0)) {
            MockOutcome::Code(code) => Ok(StageOutput::exit(code)),
            MockOutcome::Transient(code) => Err(StageError::TransientProcessFailure { code }),
            MockOutcome::Fatal(reason) => Err(StageError::fatal(reason)),
        }
    }
}
