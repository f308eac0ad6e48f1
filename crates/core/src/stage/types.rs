//! Types for the stage module.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::item::ItemPhase;

use super::traits::{StageAction, StagePredicate};

/// Result of one stage attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutput {
    /// Result code judged against [`RetryPolicy::accept_codes`].
    pub code: i32,
}

impl StageOutput {
    pub fn success() -> Self {
        Self { code: 0 }
    }

    pub fn exit(code: i32) -> Self {
        Self { code }
    }
}

/// How many times a stage may run and which result codes count as success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts including the first one.
    pub max_attempts: u32,
    pub accept_codes: Vec<i32>,
    /// Pause between attempts in milliseconds.
    #[serde(default)]
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once()
    }
}

impl RetryPolicy {
    /// A single attempt that must return `0`.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            accept_codes: vec![0],
            retry_delay_ms: 0,
        }
    }

    /// Up to `max_attempts` attempts, accepting `0`.
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::once()
        }
    }

    pub fn accepting(mut self, codes: impl Into<Vec<i32>>) -> Self {
        self.accept_codes = codes.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn accepts(&self, code: i32) -> bool {
        self.accept_codes.contains(&code)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// How a stage is admitted.
#[derive(Clone)]
pub enum StageKind {
    /// Always runs.
    Simple,
    /// Runs only when the predicate holds; otherwise skipped as a success.
    Conditional(Arc<dyn StagePredicate>),
    /// Runs while holding a slot of the named gate.
    Gated { gate: String },
}

impl StageKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Conditional(_) => "conditional",
            Self::Gated { .. } => "gated",
        }
    }
}

impl std::fmt::Debug for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => f.write_str("Simple"),
            Self::Conditional(_) => f.write_str("Conditional"),
            Self::Gated { gate } => f.debug_struct("Gated").field("gate", gate).finish(),
        }
    }
}

/// A named pipeline step, shared by all items.
#[derive(Clone)]
pub struct Stage {
    name: String,
    kind: StageKind,
    retry: RetryPolicy,
    action: Arc<dyn StageAction>,
    reaches: Option<ItemPhase>,
}

impl Stage {
    pub fn simple(name: impl Into<String>, action: Arc<dyn StageAction>) -> Self {
        Self {
            name: name.into(),
            kind: StageKind::Simple,
            retry: RetryPolicy::once(),
            action,
            reaches: None,
        }
    }

    pub fn conditional(
        name: impl Into<String>,
        predicate: Arc<dyn StagePredicate>,
        action: Arc<dyn StageAction>,
    ) -> Self {
        Self {
            kind: StageKind::Conditional(predicate),
            ..Self::simple(name, action)
        }
    }

    pub fn gated(
        name: impl Into<String>,
        gate: impl Into<String>,
        action: Arc<dyn StageAction>,
    ) -> Self {
        Self {
            kind: StageKind::Gated { gate: gate.into() },
            ..Self::simple(name, action)
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Phase the item enters once this stage completes.
    pub fn reaching(mut self, phase: ItemPhase) -> Self {
        self.reaches = Some(phase);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &StageKind {
        &self.kind
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn action(&self) -> &Arc<dyn StageAction> {
        &self.action
    }

    pub fn reaches(&self) -> Option<ItemPhase> {
        self.reaches
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("retry", &self.retry)
            .field("reaches", &self.reaches)
            .finish()
    }
}
