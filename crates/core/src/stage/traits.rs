//! Trait definitions for the stage module.

use async_trait::async_trait;

use crate::item::Item;

use super::error::StageError;
use super::types::StageOutput;

/// The work a stage performs for one item.
#[async_trait]
pub trait StageAction: Send + Sync {
    /// Runs one attempt. The result code is judged by the stage's retry policy.
    async fn run(&self, item: &mut Item) -> Result<StageOutput, StageError>;
}

/// Decides whether a conditional stage runs for an item.
pub trait StagePredicate: Send + Sync {
    fn should_run(&self, item: &Item) -> bool;
}

/// Adapts a closure into a [`StagePredicate`].
pub struct FnPredicate<F>(pub F);

impl<F> StagePredicate for FnPredicate<F>
where
    F: Fn(&Item) -> bool + Send + Sync,
{
    fn should_run(&self, item: &Item) -> bool {
        (self.0)(item)
    }
}
