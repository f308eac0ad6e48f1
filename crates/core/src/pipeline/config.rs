//! Configuration for the pipeline driver.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Shared output area; per-item working directories live inside it.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Items processed at the same time.
    #[serde(default = "default_concurrent_items")]
    pub concurrent_items: usize,

    /// Wall-clock budget per item. No limit when unset.
    #[serde(default)]
    pub item_deadline_secs: Option<u64>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_concurrent_items() -> usize {
    2
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            concurrent_items: default_concurrent_items(),
            item_deadline_secs: None,
        }
    }
}

impl WorkerConfig {
    pub fn item_deadline(&self) -> Option<Duration> {
        self.item_deadline_secs.map(Duration::from_secs)
    }
}
