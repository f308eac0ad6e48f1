//! Configuration for the uploader module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::gate::GateSpec;

/// Upper bound on simultaneous uploads.
pub const MAX_UPLOAD_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_rsync_path")]
    pub rsync_path: PathBuf,

    /// Concurrent uploads across all items (1..=4).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Arguments placed before the source and destination.
    #[serde(default = "default_extra_args")]
    pub extra_args: Vec<String>,

    /// Maximum wait for an upload slot. Unbounded when unset.
    #[serde(default)]
    pub gate_timeout_secs: Option<u64>,
}

fn default_rsync_path() -> PathBuf {
    PathBuf::from("rsync")
}

fn default_concurrency() -> usize {
    1
}

fn default_extra_args() -> Vec<String> {
    ["--recursive", "--partial", "--partial-dir", ".rsync-tmp"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            rsync_path: default_rsync_path(),
            concurrency: default_concurrency(),
            extra_args: default_extra_args(),
            gate_timeout_secs: None,
        }
    }
}

impl UploadConfig {
    /// Gate settings for the upload stage.
    pub fn gate_spec(&self) -> GateSpec {
        GateSpec::new(self.concurrency)
            .with_acquire_timeout(self.gate_timeout_secs.map(Duration::from_secs))
    }
}
