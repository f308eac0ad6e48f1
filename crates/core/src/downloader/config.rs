//! Configuration for the downloader module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::stage::RetryPolicy;

/// What happens to a partial artifact before a download is retried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryOutput {
    /// Truncate the artifact to zero bytes before every attempt.
    #[default]
    Truncate,
    /// Leave it; the downloader writes after whatever is there.
    Append,
}

/// Configuration for wget-lua.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Executables to try, in order.
    #[serde(default = "default_candidates")]
    pub candidates: Vec<PathBuf>,

    /// Substring that `--version` output must contain.
    #[serde(default = "default_required_version")]
    pub required_version: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network timeout passed to wget (`--timeout`).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,

    /// Per-URL tries inside one wget run (`--tries`).
    #[serde(default = "default_tries")]
    pub tries: u32,

    /// Seconds between wget's own retries (`--waitretry`).
    #[serde(default = "default_retry_wait")]
    pub retry_wait_secs: u32,

    /// Whole-process attempts made by the download stage.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_accept_exit_codes")]
    pub accept_exit_codes: Vec<i32>,

    /// Inserted before the item URL.
    #[serde(default)]
    pub extra_args: Vec<String>,

    #[serde(default)]
    pub retry_output: RetryOutput,

    /// Pause between download attempts in seconds.
    #[serde(default)]
    pub retry_delay_secs: u64,
}

fn default_candidates() -> Vec<PathBuf> {
    [
        "./wget-lua",
        "./wget-lua-warrior",
        "./wget-lua-local",
        "../wget-lua",
        "../../wget-lua",
        "/home/warrior/wget-lua",
        "/usr/bin/wget-lua",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

fn default_required_version() -> String {
    "GNU Wget 1.14.lua.20130523-9a5c".to_string()
}

fn default_user_agent() -> String {
    "ArchiveTeam Warrior".to_string()
}

fn default_timeout() -> u32 {
    60
}

fn default_tries() -> u32 {
    20
}

fn default_retry_wait() -> u32 {
    5
}

fn default_max_attempts() -> u32 {
    5
}

fn default_accept_exit_codes() -> Vec<i32> {
    vec![0]
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            required_version: default_required_version(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
            tries: default_tries(),
            retry_wait_secs: default_retry_wait(),
            max_attempts: default_max_attempts(),
            accept_exit_codes: default_accept_exit_codes(),
            extra_args: Vec::new(),
            retry_output: RetryOutput::default(),
            retry_delay_secs: 0,
        }
    }
}

impl DownloaderConfig {
    /// Retry policy of the download stage.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::attempts(self.max_attempts)
            .accepting(self.accept_exit_codes.clone())
            .with_delay(Duration::from_secs(self.retry_delay_secs))
    }
}
