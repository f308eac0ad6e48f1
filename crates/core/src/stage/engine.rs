//! Runs an item through an ordered list of stages.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::gate::{GateRegistry, GateToken};
use crate::item::{Item, StageRecord};
use crate::metrics;

use super::error::StageError;
use super::types::{Stage, StageKind};

/// Called with the item and stage name as each stage begins.
pub type StageObserver = Arc<dyn Fn(&Item, &str) + Send + Sync>;

/// Executes stage lists. Cheap to clone; one engine serves every item.
#[derive(Clone)]
pub struct StageEngine {
    gates: Arc<GateRegistry>,
    observer: Option<StageObserver>,
}

impl StageEngine {
    pub fn new(gates: Arc<GateRegistry>) -> Self {
        Self {
            gates,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: StageObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn gates(&self) -> &Arc<GateRegistry> {
        &self.gates
    }

    /// Runs `stages` in order against `item`.
    ///
    /// On the first unrecoverable failure the item is marked failed, the
    /// remaining stages are not run, and the error is returned. When every
    /// stage succeeds (or is skipped) the item is marked succeeded.
    pub async fn execute(&self, item: &mut Item, stages: &[Stage]) -> Result<(), StageError> {
        item.start();
        for stage in stages {
            if let Err(err) = self.run_stage(item, stage).await {
                warn!(stage = stage.name(), error = %err, "Stage failed, aborting item");
                item.fail(err.to_string());
                return Err(err);
            }
            if let Some(phase) = stage.reaches() {
                item.advance(phase);
            }
        }
        item.succeed();
        info!(phase = item.phase().as_str(), "Item completed");
        Ok(())
    }

    async fn run_stage(&self, item: &mut Item, stage: &Stage) -> Result<(), StageError> {
        if let Some(observer) = &self.observer {
            observer(item, stage.name());
        }
        let started = Instant::now();

        if let StageKind::Conditional(predicate) = stage.kind() {
            if !predicate.should_run(item) {
                debug!(stage = stage.name(), "Condition false, skipping stage");
                metrics::STAGE_ATTEMPTS
                    .with_label_values(&[stage.name(), "skipped"])
                    .inc();
                item.record_stage(
                    stage.name(),
                    StageRecord {
                        skipped: true,
                        succeeded: true,
                        ..Default::default()
                    },
                );
                return Ok(());
            }
        }

        let token = match stage.kind() {
            StageKind::Gated { gate } => match self.acquire(gate).await {
                Ok(token) => Some(token),
                Err(err) => {
                    item.record_stage(
                        stage.name(),
                        StageRecord {
                            duration_ms: started.elapsed().as_millis() as u64,
                            ..Default::default()
                        },
                    );
                    return Err(err);
                }
            },
            _ => None,
        };

        let (result, mut record) = self.attempt(item, stage).await;
        // Released whatever the outcome.
        drop(token);

        let elapsed = started.elapsed();
        record.duration_ms = elapsed.as_millis() as u64;
        metrics::STAGE_DURATION
            .with_label_values(&[stage.name()])
            .observe(elapsed.as_secs_f64());
        item.record_stage(stage.name(), record);
        result
    }

    async fn acquire(&self, gate: &str) -> Result<GateToken, StageError> {
        let gate = self.gates.gate(gate)?;
        debug!(gate = gate.name(), in_use = gate.in_use(), "Waiting for gate");
        let token = gate.acquire().await?;
        debug!(gate = token.gate_name(), "Holding gate");
        Ok(token)
    }

    /// The retry loop. Always returns the record of what happened.
    async fn attempt(&self, item: &mut Item, stage: &Stage) -> (Result<(), StageError>, StageRecord) {
        let policy = stage.retry();
        let mut record = StageRecord::default();

        loop {
            record.attempts += 1;
            let attempt = record.attempts;
            debug!(stage = stage.name(), attempt, max = policy.max_attempts, "Running stage");

            match stage.action().run(item).await {
                Ok(output) if policy.accepts(output.code) => {
                    metrics::STAGE_ATTEMPTS
                        .with_label_values(&[stage.name(), "success"])
                        .inc();
                    record.exit_code = Some(output.code);
                    record.succeeded = true;
                    return (Ok(()), record);
                }
                Ok(output) => {
                    record.exit_code = Some(output.code);
                    self.rejected(stage, attempt, record.exit_code);
                }
                Err(err) if err.is_retryable() => {
                    record.exit_code = err.exit_code();
                    self.rejected(stage, attempt, record.exit_code);
                }
                Err(err) => {
                    metrics::STAGE_ATTEMPTS
                        .with_label_values(&[stage.name(), "error"])
                        .inc();
                    return (Err(err), record);
                }
            }

            if attempt >= policy.max_attempts {
                let err = StageError::RetriesExhausted {
                    stage: stage.name().to_string(),
                    attempts: attempt,
                    last_code: record.exit_code,
                };
                return (Err(err), record);
            }

            let delay = policy.retry_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    fn rejected(&self, stage: &Stage, attempt: u32, code: Option<i32>) {
        metrics::STAGE_ATTEMPTS
            .with_label_values(&[stage.name(), "rejected"])
            .inc();
        warn!(
            stage = stage.name(),
            attempt,
            code = ?code,
            accepted = ?stage.retry().accept_codes,
            "Stage attempt returned an unaccepted code"
        );
    }
}

impl std::fmt::Debug for StageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageEngine")
            .field("gates", &self.gates.status())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
