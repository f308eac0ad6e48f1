//! Stage actions of the archiving pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use crate::coordinator::{Coordinator, CoordinatorIdentity};
use crate::downloader::{RetryOutput, WgetDownloader};
use crate::gate::UPLOAD_GATE;
use crate::item::{Item, ItemLayout, ItemPhase};
use crate::stage::{Stage, StageAction, StageError, StageOutput};
use crate::supervisor::ProcessSupervisor;
use crate::uploader::{resolve_target, RsyncUploader};
use crate::workspace::{WorkspaceError, WorkspaceManager};

pub const PREPARE_DIRECTORIES: &str = "prepare_directories";
pub const DOWNLOAD: &str = "download";
pub const PREPARE_STATS: &str = "prepare_stats";
pub const MOVE_FILES: &str = "move_files";
pub const UPLOAD: &str = "upload";
pub const SEND_DONE: &str = "send_done";

/// Everything the stage actions need.
#[derive(Clone)]
pub struct PipelineParts {
    pub workspace: WorkspaceManager,
    pub downloader: WgetDownloader,
    pub uploader: RsyncUploader,
    pub supervisor: ProcessSupervisor,
    pub coordinator: Arc<dyn Coordinator>,
    pub identity: CoordinatorIdentity,
}

/// The stage sequence, in execution order.
///
/// Only the download retries; every other stage gets a single attempt.
pub fn build_stages(parts: &PipelineParts) -> Vec<Stage> {
    vec![
        Stage::simple(
            PREPARE_DIRECTORIES,
            Arc::new(PrepareDirectories::new(parts.workspace.clone())),
        )
        .reaching(ItemPhase::DirectoryPrepared),
        Stage::simple(
            DOWNLOAD,
            Arc::new(Download::new(parts.downloader.clone(), parts.supervisor.clone())),
        )
        .with_retry(parts.downloader.config().retry_policy())
        .reaching(ItemPhase::Downloaded),
        Stage::simple(PREPARE_STATS, Arc::new(PrepareStats::new(parts.identity.clone())))
            .reaching(ItemPhase::StatsCollected),
        Stage::simple(MOVE_FILES, Arc::new(MoveFiles::new(parts.workspace.clone())))
            .reaching(ItemPhase::FilesRelocated),
        Stage::gated(
            UPLOAD,
            UPLOAD_GATE,
            Arc::new(Upload::new(
                Arc::clone(&parts.coordinator),
                parts.uploader.clone(),
                parts.supervisor.clone(),
                parts.identity.downloader.clone(),
            )),
        )
        .reaching(ItemPhase::Uploaded),
        Stage::simple(SEND_DONE, Arc::new(SendDone::new(Arc::clone(&parts.coordinator))))
            .reaching(ItemPhase::Reported),
    ]
}

fn layout_of(item: &Item) -> Result<ItemLayout, WorkspaceError> {
    item.layout()
        .cloned()
        .ok_or_else(|| WorkspaceError::NotPrepared {
            name: item.name().to_string(),
        })
}

/// Allocates a fresh working directory.
pub struct PrepareDirectories {
    workspace: WorkspaceManager,
}

impl PrepareDirectories {
    pub fn new(workspace: WorkspaceManager) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl StageAction for PrepareDirectories {
    async fn run(&self, item: &mut Item) -> Result<StageOutput, StageError> {
        let layout = self.workspace.prepare(item).await?;
        debug!(work_dir = %layout.work_dir.display(), file_base = %layout.file_base, "Workspace ready");
        Ok(StageOutput::success())
    }
}

/// Runs wget-lua against the item URL.
pub struct Download {
    wget: WgetDownloader,
    supervisor: ProcessSupervisor,
}

impl Download {
    pub fn new(wget: WgetDownloader, supervisor: ProcessSupervisor) -> Self {
        Self { wget, supervisor }
    }
}

#[async_trait]
impl StageAction for Download {
    async fn run(&self, item: &mut Item) -> Result<StageOutput, StageError> {
        let layout = layout_of(item)?;
        if self.wget.config().retry_output == RetryOutput::Truncate {
            // Also recreates the placeholder if a failed attempt removed it.
            fs::File::create(layout.work_artifact())
                .await
                .map_err(WorkspaceError::from)?;
        }

        let request = self.wget.request(&layout, item.name(), item.deadline());
        let handle = self.supervisor.run(request, None).await?;
        let code = handle.exit_code.unwrap_or(-1);
        if code != 0 {
            debug!(code, tail = %tail(&handle.output_lossy()), "wget exited non-zero");
        }
        Ok(StageOutput::exit(code))
    }
}

/// Last line of process output, for logs.
fn tail(output: &str) -> &str {
    output.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("")
}

/// Fills in the statistics reported with the item.
pub struct PrepareStats {
    identity: CoordinatorIdentity,
}

impl PrepareStats {
    pub fn new(identity: CoordinatorIdentity) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl StageAction for PrepareStats {
    async fn run(&self, item: &mut Item) -> Result<StageOutput, StageError> {
        let layout = layout_of(item)?;
        let size = fs::metadata(layout.work_artifact())
            .await
            .map_err(WorkspaceError::from)?
            .len();

        let name = item.name().to_string();
        let stats = item.stats_mut();
        stats.downloader = self.identity.downloader.clone();
        stats.version = self.identity.version.clone();
        stats.items = vec![name];
        stats.bytes.insert("data".to_string(), size);
        debug!(bytes = size, "Stats prepared");
        Ok(StageOutput::success())
    }
}

/// Moves the artifact into the shared output area.
pub struct MoveFiles {
    workspace: WorkspaceManager,
}

impl MoveFiles {
    pub fn new(workspace: WorkspaceManager) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl StageAction for MoveFiles {
    async fn run(&self, item: &mut Item) -> Result<StageOutput, StageError> {
        self.workspace.finalize(item).await?;
        Ok(StageOutput::success())
    }
}

/// Uploads the relocated artifact to the target the coordinator names.
pub struct Upload {
    coordinator: Arc<dyn Coordinator>,
    uploader: RsyncUploader,
    supervisor: ProcessSupervisor,
    downloader: String,
}

impl Upload {
    pub fn new(
        coordinator: Arc<dyn Coordinator>,
        uploader: RsyncUploader,
        supervisor: ProcessSupervisor,
        downloader: String,
    ) -> Self {
        Self {
            coordinator,
            uploader,
            supervisor,
            downloader,
        }
    }
}

#[async_trait]
impl StageAction for Upload {
    async fn run(&self, item: &mut Item) -> Result<StageOutput, StageError> {
        let layout = layout_of(item)?;
        let target = self.coordinator.upload_target(item).await?;
        let target = resolve_target(&target, &self.downloader);
        info!(target = %target, "Uploading");

        let request = self.uploader.request(&layout, &target, item.deadline());
        let handle = self.supervisor.run(request, None).await?;
        let code = handle.exit_code.unwrap_or(-1);
        if code != 0 {
            debug!(code, tail = %tail(&handle.output_lossy()), "rsync exited non-zero");
        }
        Ok(StageOutput::exit(code))
    }
}

/// Reports completion with the collected statistics.
pub struct SendDone {
    coordinator: Arc<dyn Coordinator>,
}

impl SendDone {
    pub fn new(coordinator: Arc<dyn Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl StageAction for SendDone {
    async fn run(&self, item: &mut Item) -> Result<StageOutput, StageError> {
        let item: &Item = item;
        self.coordinator.report_done(item, item.stats()).await?;
        info!(coordinator = self.coordinator.name(), "Reported done");
        Ok(StageOutput::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::DownloaderConfig;
    use crate::stage::StageKind;
    use crate::testing::MockCoordinator;
    use crate::uploader::UploadConfig;
    use tempfile::TempDir;

    fn parts(data_dir: &std::path::Path, coordinator: Arc<MockCoordinator>) -> PipelineParts {
        PipelineParts {
            workspace: WorkspaceManager::new(data_dir, "bliptv"),
            downloader: WgetDownloader::new("/bin/false", DownloaderConfig::default()),
            uploader: RsyncUploader::new(UploadConfig::default()),
            supervisor: ProcessSupervisor::default(),
            coordinator,
            identity: CoordinatorIdentity::new("alice", "20131011.01"),
        }
    }

    #[test]
    fn test_stage_sequence() {
        let dir = TempDir::new().unwrap();
        let stages = build_stages(&parts(dir.path(), Arc::new(MockCoordinator::new())));
        let names: Vec<&str> = stages.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![PREPARE_DIRECTORIES, DOWNLOAD, PREPARE_STATS, MOVE_FILES, UPLOAD, SEND_DONE]
        );

        for stage in &stages {
            let expected = if stage.name() == DOWNLOAD { 5 } else { 1 };
            assert_eq!(stage.retry().max_attempts, expected, "{}", stage.name());
        }
        assert!(matches!(
            stages[4].kind(),
            StageKind::Gated { gate } if gate == UPLOAD_GATE
        ));
        assert_eq!(stages[5].reaches(), Some(ItemPhase::Reported));
    }

    #[tokio::test]
    async fn test_prepare_stats_measures_artifact() {
        let dir = TempDir::new().unwrap();
        let workspace = WorkspaceManager::new(dir.path(), "bliptv");
        let mut item = Item::claimed("bloopertv", "http://blip.tv/show/ep-1.flv");
        let layout = workspace.prepare(&mut item).await.unwrap();
        std::fs::write(layout.work_artifact(), b"0123456789").unwrap();

        let action = PrepareStats::new(CoordinatorIdentity::new("alice", "20131011.01"));
        action.run(&mut item).await.unwrap();

        let stats = item.stats();
        assert_eq!(stats.downloader, "alice");
        assert_eq!(stats.version, "20131011.01");
        assert_eq!(stats.items, vec!["http://blip.tv/show/ep-1.flv"]);
        assert_eq!(stats.bytes["data"], 10);
    }

    #[tokio::test]
    async fn test_download_requires_workspace() {
        let action = Download::new(
            WgetDownloader::new("/bin/false", DownloaderConfig::default()),
            ProcessSupervisor::default(),
        );
        let mut item = Item::claimed("bloopertv", "http://blip.tv/show/ep-1.flv");
        let err = action.run(&mut item).await.unwrap_err();
        assert!(matches!(
            err,
            StageError::Workspace(WorkspaceError::NotPrepared { .. })
        ));
    }

    #[tokio::test]
    async fn test_send_done_reports_stats() {
        let coordinator = Arc::new(MockCoordinator::new());
        let action = SendDone::new(coordinator.clone());
        let mut item = Item::claimed("bloopertv", "http://blip.tv/show/ep-1.flv");
        item.stats_mut().add_bytes("data", 7);

        action.run(&mut item).await.unwrap();

        let done = coordinator.done_reports().await;
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].item, "http://blip.tv/show/ep-1.flv");
        assert_eq!(done[0].stats.bytes["data"], 7);
    }

    #[test]
    fn test_tail_skips_blank_lines() {
        assert_eq!(tail("a\nlast line\n\n"), "last line");
        assert_eq!(tail(""), "");
    }
}
