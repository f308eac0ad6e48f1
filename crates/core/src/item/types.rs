//! Item record, lifecycle and statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use super::naming::ItemLayout;

/// Terminal and non-terminal item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Claimed,
    Running,
    Succeeded,
    Failed,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Progress through the fixed stage sequence.
///
/// Ordered: a later phase always implies every earlier one completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemPhase {
    Claimed,
    DirectoryPrepared,
    Downloaded,
    StatsCollected,
    FilesRelocated,
    Uploaded,
    Reported,
}

impl ItemPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claimed => "claimed",
            Self::DirectoryPrepared => "directory_prepared",
            Self::Downloaded => "downloaded",
            Self::StatsCollected => "stats_collected",
            Self::FilesRelocated => "files_relocated",
            Self::Uploaded => "uploaded",
            Self::Reported => "reported",
        }
    }
}

/// Outcome metadata for one stage of one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub skipped: bool,
    pub succeeded: bool,
}

/// Statistics reported to the coordinator on completion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ItemStats {
    pub downloader: String,
    pub version: String,
    /// Item names covered by this report.
    pub items: Vec<String>,
    /// Total bytes per file group.
    pub bytes: BTreeMap<String, u64>,
    /// Stage name to outcome.
    pub stages: BTreeMap<String, StageRecord>,
}

impl ItemStats {
    pub fn add_bytes(&mut self, group: &str, bytes: u64) {
        *self.bytes.entry(group.to_string()).or_insert(0) += bytes;
    }

    pub fn total_bytes(&self) -> u64 {
        self.bytes.values().sum()
    }
}

/// One unit of work.
#[derive(Debug, Clone)]
pub struct Item {
    project: String,
    name: String,
    layout: Option<ItemLayout>,
    stats: ItemStats,
    status: ItemStatus,
    phase: ItemPhase,
    claimed_at: DateTime<Utc>,
    deadline: Option<Instant>,
    failure: Option<String>,
}

impl Item {
    /// Creates a freshly claimed item.
    pub fn claimed(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            layout: None,
            stats: ItemStats::default(),
            status: ItemStatus::Claimed,
            phase: ItemPhase::Claimed,
            claimed_at: Utc::now(),
            deadline: None,
            failure: None,
        }
    }

    /// Sets the instant after which supervised processes are killed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> Option<&ItemLayout> {
        self.layout.as_ref()
    }

    pub fn set_layout(&mut self, layout: ItemLayout) {
        self.layout = Some(layout);
    }

    pub fn stats(&self) -> &ItemStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut ItemStats {
        &mut self.stats
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn phase(&self) -> ItemPhase {
        self.phase
    }

    pub fn claimed_at(&self) -> DateTime<Utc> {
        self.claimed_at
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub(crate) fn start(&mut self) {
        if !self.status.is_terminal() {
            self.status = ItemStatus::Running;
        }
    }

    /// Moves the item forward. Phases never move backwards.
    pub(crate) fn advance(&mut self, phase: ItemPhase) {
        if phase > self.phase {
            self.phase = phase;
        }
    }

    pub(crate) fn succeed(&mut self) {
        self.status = ItemStatus::Succeeded;
    }

    pub(crate) fn fail(&mut self, reason: impl Into<String>) {
        self.status = ItemStatus::Failed;
        self.failure = Some(reason.into());
    }

    pub(crate) fn record_stage(&mut self, stage: &str, record: StageRecord) {
        self.stats.stages.insert(stage.to_string(), record);
    }

    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            name: self.name.clone(),
            status: self.status,
            phase: self.phase,
            claimed_at: self.claimed_at,
            current_stage: None,
        }
    }
}

/// Read-only view of an in-flight item for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ItemSnapshot {
    pub name: String,
    pub status: ItemStatus,
    pub phase: ItemPhase,
    pub claimed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_is_claimed() {
        let item = Item::claimed("blip", "http://blip.tv/a/b.flv");
        assert_eq!(item.status(), ItemStatus::Claimed);
        assert_eq!(item.phase(), ItemPhase::Claimed);
        assert!(item.layout().is_none());
        assert!(item.failure().is_none());
    }

    #[test]
    fn test_phase_never_regresses() {
        let mut item = Item::claimed("blip", "http://blip.tv/a/b.flv");
        item.advance(ItemPhase::Downloaded);
        item.advance(ItemPhase::DirectoryPrepared);
        assert_eq!(item.phase(), ItemPhase::Downloaded);
    }

    #[test]
    fn test_fail_records_reason() {
        let mut item = Item::claimed("blip", "http://blip.tv/a/b.flv");
        item.start();
        assert_eq!(item.status(), ItemStatus::Running);
        item.fail("download exhausted");
        assert_eq!(item.status(), ItemStatus::Failed);
        assert_eq!(item.failure(), Some("download exhausted"));
        item.start();
        assert_eq!(item.status(), ItemStatus::Failed);
    }

    #[test]
    fn test_stats_bytes_accumulate() {
        let mut stats = ItemStats::default();
        stats.add_bytes("data", 10);
        stats.add_bytes("data", 5);
        stats.add_bytes("log", 1);
        assert_eq!(stats.bytes["data"], 15);
        assert_eq!(stats.total_bytes(), 16);
    }

    #[test]
    fn test_stats_serialize_shape() {
        let mut stats = ItemStats {
            downloader: "alice".to_string(),
            version: "20131011.01".to_string(),
            items: vec!["http://blip.tv/a/b.flv".to_string()],
            ..Default::default()
        };
        stats.add_bytes("data", 42);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["downloader"], "alice");
        assert_eq!(json["bytes"]["data"], 42);
        assert_eq!(json["items"][0], "http://blip.tv/a/b.flv");
    }
}
