//! Coordinator configuration.

use serde::{Deserialize, Serialize};

/// Connection settings for the tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Tracker base URL, without the project segment.
    pub url: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u32,
    /// Whether the tracker accepts `/failed` reports.
    #[serde(default)]
    pub supports_failure_reports: bool,
    /// How long to wait before asking again when no item is available.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_timeout_secs() -> u32 {
    30
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

impl CoordinatorConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: default_timeout_secs(),
            supports_failure_reports: false,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}
