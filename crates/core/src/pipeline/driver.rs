//! Scheduling loop that keeps several items in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::coordinator::{Coordinator, CoordinatorError, CoordinatorIdentity};
use crate::downloader::WgetDownloader;
use crate::gate::{GateRegistry, UPLOAD_GATE};
use crate::item::{Item, ItemStatus};
use crate::metrics;
use crate::stage::{Stage, StageEngine, StageError};
use crate::supervisor::ProcessSupervisor;
use crate::uploader::RsyncUploader;
use crate::workspace::WorkspaceManager;

use super::stages::{build_stages, PipelineParts};
use super::status::PipelineMonitor;

/// Extra time the item timeout allows beyond the process deadline, so a
/// supervised process is killed by its supervisor before its task is dropped.
/// Never more than the deadline itself.
const DEADLINE_GRACE: Duration = Duration::from_secs(5);

/// Scheduling parameters.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub project: String,
    /// No items are claimed after this instant.
    pub project_deadline: Option<DateTime<Utc>>,
    pub concurrent_items: usize,
    pub item_deadline: Option<Duration>,
    /// Wait after the coordinator has nothing or fails.
    pub poll_interval: Duration,
}

impl DriverSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            project: config.project.name.clone(),
            project_deadline: config.project.deadline,
            concurrent_items: config.worker.concurrent_items.max(1),
            item_deadline: config.worker.item_deadline(),
            poll_interval: Duration::from_millis(config.coordinator.poll_interval_ms),
        }
    }
}

/// Totals for one [`PipelineDriver::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub claimed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// What each item task needs, cloned into every task.
#[derive(Clone)]
struct ItemRunner {
    engine: StageEngine,
    stages: Arc<Vec<Stage>>,
    coordinator: Arc<dyn Coordinator>,
    monitor: Arc<PipelineMonitor>,
    item_deadline: Option<Duration>,
}

/// Running item tasks and the item name each one carries.
#[derive(Default)]
struct ItemTasks {
    set: JoinSet<Item>,
    names: HashMap<Id, String>,
}

/// Claims items and runs each one through the stage list on its own task.
pub struct PipelineDriver {
    settings: DriverSettings,
    coordinator: Arc<dyn Coordinator>,
    gates: Arc<GateRegistry>,
    monitor: Arc<PipelineMonitor>,
    runner: ItemRunner,
}

impl PipelineDriver {
    pub fn new(
        settings: DriverSettings,
        coordinator: Arc<dyn Coordinator>,
        gates: Arc<GateRegistry>,
        stages: Vec<Stage>,
    ) -> Self {
        let monitor = Arc::new(PipelineMonitor::new());
        let observer = Arc::clone(&monitor);
        let engine = StageEngine::new(Arc::clone(&gates)).with_observer(Arc::new(
            move |item: &Item, stage: &str| observer.stage_started(item, stage),
        ));

        let runner = ItemRunner {
            engine,
            stages: Arc::new(stages),
            coordinator: Arc::clone(&coordinator),
            monitor: Arc::clone(&monitor),
            item_deadline: settings.item_deadline,
        };

        Self {
            settings,
            coordinator,
            gates,
            monitor,
            runner,
        }
    }

    /// Wires the full archiving pipeline from configuration.
    pub fn from_config(
        config: &Config,
        coordinator: Arc<dyn Coordinator>,
        downloader: WgetDownloader,
    ) -> Self {
        let gates = Arc::new(GateRegistry::new().with_gate(UPLOAD_GATE, config.upload.gate_spec()));
        let parts = PipelineParts {
            workspace: WorkspaceManager::new(&config.worker.data_dir, &config.project.file_prefix),
            downloader,
            uploader: RsyncUploader::new(config.upload.clone()),
            supervisor: ProcessSupervisor::new(config.supervisor.clone()),
            coordinator: Arc::clone(&coordinator),
            identity: CoordinatorIdentity::new(&config.project.downloader, &config.project.version),
        };
        let stages = build_stages(&parts);
        Self::new(DriverSettings::from_config(config), coordinator, gates, stages)
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    pub fn monitor(&self) -> Arc<PipelineMonitor> {
        Arc::clone(&self.monitor)
    }

    pub fn gates(&self) -> Arc<GateRegistry> {
        Arc::clone(&self.gates)
    }

    /// Runs until `shutdown` turns true (or its sender goes away) or the
    /// project deadline passes, then waits for in-flight items to finish.
    ///
    /// Gates are closed once the last item is done, so a driver runs once.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> RunSummary {
        let mut tasks = ItemTasks::default();
        let mut summary = RunSummary::default();
        info!(
            project = %self.settings.project,
            concurrent_items = self.settings.concurrent_items,
            "Pipeline driver started"
        );

        loop {
            while let Some(joined) = tasks.set.try_join_next_with_id() {
                self.reap(&mut tasks, joined, &mut summary);
            }

            if stopping(&shutdown) {
                info!("Shutdown requested, no longer claiming items");
                break;
            }
            if self.past_deadline() {
                info!("Project deadline passed, no longer claiming items");
                break;
            }

            if tasks.set.len() >= self.settings.concurrent_items {
                let joined = tokio::select! {
                    joined = tasks.set.join_next_with_id() => joined,
                    _ = shutdown.changed() => None,
                };
                if let Some(joined) = joined {
                    self.reap(&mut tasks, joined, &mut summary);
                }
                continue;
            }

            match self.coordinator.claim_next(&self.settings.project).await {
                Ok(Some(name)) => {
                    summary.claimed += 1;
                    metrics::ITEMS_CLAIMED.inc();
                    self.spawn_item(&mut tasks, name);
                }
                Ok(None) => {
                    debug!("No item available");
                    self.idle(&mut shutdown).await;
                }
                Err(CoordinatorError::RateLimited) => {
                    warn!("Coordinator rate limited us, backing off");
                    self.idle(&mut shutdown).await;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to claim item");
                    self.idle(&mut shutdown).await;
                }
            }
        }

        self.monitor.stop_accepting();
        if !tasks.set.is_empty() {
            info!(in_flight = tasks.set.len(), "Waiting for in-flight items");
        }
        while let Some(joined) = tasks.set.join_next_with_id().await {
            self.reap(&mut tasks, joined, &mut summary);
        }
        self.gates.close_all();

        info!(
            claimed = summary.claimed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Pipeline driver stopped"
        );
        summary
    }

    fn spawn_item(&self, tasks: &mut ItemTasks, name: String) {
        let mut item = Item::claimed(&self.settings.project, name);
        if let Some(limit) = self.settings.item_deadline {
            item = item.with_deadline(Instant::now() + limit);
        }
        self.monitor.claimed(&item);
        info!(item = item.name(), "Claimed item");

        let span = info_span!("item", name = %item.name());
        let runner = self.runner.clone();
        let name = item.name().to_string();
        let handle = tasks
            .set
            .spawn(async move { runner.process(item).await }.instrument(span));
        tasks.names.insert(handle.id(), name);
    }

    fn reap(
        &self,
        tasks: &mut ItemTasks,
        joined: Result<(Id, Item), JoinError>,
        summary: &mut RunSummary,
    ) {
        match joined {
            Ok((id, item)) => {
                tasks.names.remove(&id);
                if item.status() == ItemStatus::Succeeded {
                    summary.succeeded += 1;
                } else {
                    summary.failed += 1;
                }
            }
            Err(e) => {
                let name = tasks.names.remove(&e.id()).unwrap_or_default();
                error!(item = %name, error = %e, "Item task ended abnormally");
                self.monitor.lost(&name);
                metrics::ITEMS_FINISHED.with_label_values(&["failed"]).inc();
                summary.failed += 1;
            }
        }
    }

    fn past_deadline(&self) -> bool {
        self.settings
            .project_deadline
            .is_some_and(|deadline| Utc::now() >= deadline)
    }

    async fn idle(&self, shutdown: &mut watch::Receiver<bool>) {
        tokio::select! {
            _ = tokio::time::sleep(self.settings.poll_interval) => {}
            _ = shutdown.changed() => {}
        }
    }
}

fn stopping(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

impl ItemRunner {
    async fn process(self, mut item: Item) -> Item {
        let result = match self.item_deadline {
            Some(limit) => {
                let budget = limit + DEADLINE_GRACE.min(limit);
                let outcome =
                    tokio::time::timeout(budget, self.engine.execute(&mut item, &self.stages)).await;
                match outcome {
                    Ok(result) => result,
                    Err(_) => {
                        let err = StageError::DeadlineExceeded;
                        item.fail(err.to_string());
                        Err(err)
                    }
                }
            }
            None => self.engine.execute(&mut item, &self.stages).await,
        };

        match &result {
            Ok(()) => {
                metrics::ITEMS_FINISHED.with_label_values(&["succeeded"]).inc();
                info!("Item succeeded");
            }
            Err(err) => {
                metrics::ITEMS_FINISHED.with_label_values(&["failed"]).inc();
                error!(kind = err.kind(), error = %err, "Item failed");
                self.report_failure(&item, err).await;
            }
        }

        self.monitor.finished(&item);
        item
    }

    async fn report_failure(&self, item: &Item, err: &StageError) {
        if !self.coordinator.supports_failure_reports() {
            warn!("Coordinator does not accept failure reports, dropping item");
            return;
        }
        let reason = format!("{}: {}", err.kind(), err);
        if let Err(e) = self.coordinator.report_failed(item, &reason).await {
            warn!(error = %e, "Failed to report item failure");
        }
    }
}
