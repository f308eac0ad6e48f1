//! Pipeline lifecycle integration tests.
//!
//! These tests run the full archiving pipeline with a mock coordinator and
//! shell scripts standing in for wget-lua and rsync:
//! - Item state transitions through every stage
//! - Download retries and exhaustion
//! - Poison items and stale working directories
//! - Artifact relocation and upload arguments

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::watch;

use warrior_core::{
    load_config_from_str,
    pipeline::{DOWNLOAD, MOVE_FILES, PREPARE_DIRECTORIES, PREPARE_STATS, UPLOAD},
    testing::{fixtures, MockCoordinator},
    Config, PipelineDriver, RunSummary, WgetDownloader,
};

const ITEM: &str = fixtures::BLIP_ITEM;

/// Fake wget-lua: fails `fail_first` times, then writes `payload`.
fn wget_script(dir: &Path, fail_first: u32) -> PathBuf {
    let body = format!(
        r#"
count_file="{dir}/wget.count"
n=$(cat "$count_file" 2>/dev/null || echo 0)
n=$((n + 1))
echo "$n" > "$count_file"
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output-document) out="$2"; shift ;;
  esac
  shift
done
if [ "$n" -le {fail_first} ]; then
  printf 'partial' >> "$out"
  echo "attempt $n failed"
  exit 4
fi
printf 'payload' >> "$out"
echo "attempt $n done"
"#,
        dir = dir.display(),
        fail_first = fail_first
    );
    fixtures::shell_script(dir, "wget-lua", &body).unwrap()
}

/// Fake rsync: records its arguments.
fn rsync_script(dir: &Path) -> PathBuf {
    let body = format!(r#"echo "$@" > "{}/rsync.args""#, dir.display());
    fixtures::shell_script(dir, "rsync", &body).unwrap()
}

struct TestHarness {
    config: Config,
    coordinator: Arc<MockCoordinator>,
    data_dir: PathBuf,
    tools: TempDir,
    _data: TempDir,
}

impl TestHarness {
    fn new(concurrent_items: usize) -> Self {
        let data = TempDir::new().expect("Failed to create data dir");
        let tools = TempDir::new().expect("Failed to create tools dir");
        let rsync = rsync_script(tools.path());

        let config = load_config_from_str(&format!(
            r#"
[project]
name = "bloopertv"
file_prefix = "bliptv"
downloader = "alice"

[coordinator]
url = "http://tracker.invalid"
poll_interval_ms = 10

[worker]
data_dir = "{data}"
concurrent_items = {concurrent_items}

[upload]
rsync_path = "{rsync}"

[supervisor]
transport = "pipe"
poll_interval_ms = 20
"#,
            data = data.path().display(),
            rsync = rsync.display(),
        ))
        .expect("Failed to parse config");

        Self {
            config,
            coordinator: Arc::new(MockCoordinator::new()),
            data_dir: data.path().to_path_buf(),
            tools,
            _data: data,
        }
    }

    fn driver(&self, fail_first: u32) -> PipelineDriver {
        let wget = wget_script(self.tools.path(), fail_first);
        let downloader = WgetDownloader::new(wget, self.config.downloader.clone());
        PipelineDriver::from_config(&self.config, self.coordinator.clone(), downloader)
    }

    /// Runs until the coordinator queue is empty and in-flight items finish.
    async fn run(&self, driver: &PipelineDriver) -> RunSummary {
        let (tx, rx) = watch::channel(false);
        let run = driver.run(rx);
        tokio::pin!(run);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
        loop {
            tokio::select! {
                summary = &mut run => return summary,
                _ = tokio::time::sleep(Duration::from_millis(10)) => {
                    assert!(tokio::time::Instant::now() < deadline, "pipeline did not finish");
                    if self.coordinator.queued().await == 0 {
                        let _ = tx.send(true);
                    }
                }
            }
        }
    }

    fn artifacts(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.data_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.is_file())
            .collect()
    }

    fn rsync_args(&self) -> Option<String> {
        std::fs::read_to_string(self.tools.path().join("rsync.args")).ok()
    }
}

#[tokio::test]
async fn test_item_runs_through_every_stage() {
    let harness = TestHarness::new(1);
    harness.coordinator.queue_items([ITEM]).await;
    let driver = harness.driver(0);

    let summary = harness.run(&driver).await;
    assert_eq!(summary.claimed, 1);
    assert_eq!(summary.succeeded, 1);

    // Artifact relocated into dataDir, working directory removed.
    let artifacts = harness.artifacts();
    assert_eq!(artifacts.len(), 1);
    let name = artifacts[0].file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.starts_with("bliptv-"), "{}", name);
    assert!(name.ends_with("-ep-1.flv"), "{}", name);
    assert_eq!(std::fs::read_to_string(&artifacts[0]).unwrap(), "payload");
    assert!(!harness.data_dir.join("ep-1.flv").exists());

    // Uploaded to the resolved target.
    let args = harness.rsync_args().expect("rsync was not run");
    assert!(args.starts_with("--recursive --partial --partial-dir .rsync-tmp"));
    assert!(args.contains(&name));
    assert!(args.trim_end().ends_with("rsync://localhost/warrior/alice/"));

    // Reported with statistics.
    let done = harness.coordinator.done_reports().await;
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].item, ITEM);
    let stats = &done[0].stats;
    assert_eq!(stats.downloader, "alice");
    assert_eq!(stats.version, "20131011.01");
    assert_eq!(stats.bytes["data"], 7);
    for stage in [PREPARE_DIRECTORIES, DOWNLOAD, PREPARE_STATS, MOVE_FILES, UPLOAD] {
        assert!(stats.stages[stage].succeeded, "{}", stage);
    }
}

#[tokio::test]
async fn test_download_retries_then_succeeds() {
    let harness = TestHarness::new(1);
    harness.coordinator.queue_items([ITEM]).await;
    let driver = harness.driver(4);

    let summary = harness.run(&driver).await;
    assert_eq!(summary.succeeded, 1);

    let done = harness.coordinator.done_reports().await;
    let download = &done[0].stats.stages[DOWNLOAD];
    assert_eq!(download.attempts, 5);
    assert_eq!(download.exit_code, Some(0));
    // Partial output from failed attempts was truncated away.
    assert_eq!(done[0].stats.bytes["data"], 7);
}

#[tokio::test]
async fn test_download_exhaustion_fails_item() {
    let harness = TestHarness::new(1);
    harness.coordinator.queue_items([ITEM]).await;
    let driver = harness.driver(100);

    let summary = harness.run(&driver).await;
    assert_eq!(summary.failed, 1);

    let count = std::fs::read_to_string(harness.tools.path().join("wget.count")).unwrap();
    assert_eq!(count.trim(), "5");
    assert!(harness.rsync_args().is_none());
    assert!(harness.coordinator.done_reports().await.is_empty());
    assert!(harness.artifacts().is_empty());
}

#[tokio::test]
async fn test_poison_item_does_not_affect_others() {
    let harness = TestHarness::new(1);
    harness
        .coordinator
        .queue_items(["no-scheme/ep-0.flv", ITEM])
        .await;
    let driver = harness.driver(0);

    let summary = harness.run(&driver).await;
    assert_eq!(summary.claimed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 1);

    let done = harness.coordinator.done_reports().await;
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].item, ITEM);
}

#[tokio::test]
async fn test_stale_working_directory_is_replaced() {
    let harness = TestHarness::new(1);
    let stale = harness.data_dir.join("ep-1.flv");
    std::fs::create_dir_all(stale.join("nested")).unwrap();
    std::fs::write(stale.join("nested/leftover.warc"), b"old").unwrap();
    harness.coordinator.queue_items([ITEM]).await;
    let driver = harness.driver(0);

    let summary = harness.run(&driver).await;
    assert_eq!(summary.succeeded, 1);
    assert!(!stale.exists());
    assert_eq!(harness.artifacts().len(), 1);
}

#[tokio::test]
async fn test_failed_report_fails_item() {
    let harness = TestHarness::new(1);
    harness.coordinator.queue_items([ITEM]).await;
    harness
        .coordinator
        .fail_next_done(warrior_core::CoordinatorError::Timeout)
        .await;
    let driver = harness.driver(0);

    let summary = harness.run(&driver).await;
    assert_eq!(summary.failed, 1);
    // The artifact was already relocated and uploaded.
    assert_eq!(harness.artifacts().len(), 1);
    assert!(harness.rsync_args().is_some());
}
