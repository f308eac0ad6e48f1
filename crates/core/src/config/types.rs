use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

pub use crate::coordinator::CoordinatorConfig;
pub use crate::downloader::{DownloaderConfig, RetryOutput};
pub use crate::pipeline::WorkerConfig;
pub use crate::supervisor::{SupervisorConfig, Transport};
pub use crate::uploader::UploadConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub project: ProjectConfig,
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

/// Project identity
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectConfig {
    /// Coordinator project id, e.g. `bloopertv`.
    pub name: String,
    /// Prefix of every artifact name.
    pub file_prefix: String,
    /// Pipeline version reported with every request.
    #[serde(default = "default_version")]
    pub version: String,
    /// Warrior nickname.
    pub downloader: String,
    /// No items are claimed after this instant.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

fn default_version() -> String {
    "20131011.01".to_string()
}

/// Status server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusConfig {
    #[serde(default = "default_status_enabled")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: default_status_enabled(),
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_status_enabled() -> bool {
    true
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8001
}

/// Configuration safe to expose over the status API.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub project: ProjectConfig,
    pub coordinator: SanitizedCoordinatorConfig,
    pub worker: WorkerConfig,
    pub downloader: SanitizedDownloaderConfig,
    pub upload: UploadConfig,
    pub supervisor: SupervisorConfig,
    pub status: StatusConfig,
}

/// Coordinator config with credentials stripped from the URL.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCoordinatorConfig {
    pub url: String,
    pub timeout_secs: u32,
    pub supports_failure_reports: bool,
    pub poll_interval_ms: u64,
}

/// Downloader config without the user agent and extra arguments.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDownloaderConfig {
    pub candidates: Vec<PathBuf>,
    pub required_version: String,
    pub timeout_secs: u32,
    pub tries: u32,
    pub retry_wait_secs: u32,
    pub max_attempts: u32,
    pub accept_exit_codes: Vec<i32>,
    pub extra_args_count: usize,
    pub retry_output: RetryOutput,
}

/// Drops any `user:password@` part of a URL.
fn strip_userinfo(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{}{}", &url[..scheme_end + 3], &rest[at + 1..]),
        None => url.to_string(),
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let d = &config.downloader;
        Self {
            project: config.project.clone(),
            coordinator: SanitizedCoordinatorConfig {
                url: strip_userinfo(&config.coordinator.url),
                timeout_secs: config.coordinator.timeout_secs,
                supports_failure_reports: config.coordinator.supports_failure_reports,
                poll_interval_ms: config.coordinator.poll_interval_ms,
            },
            worker: config.worker.clone(),
            downloader: SanitizedDownloaderConfig {
                candidates: d.candidates.clone(),
                required_version: d.required_version.clone(),
                timeout_secs: d.timeout_secs,
                tries: d.tries,
                retry_wait_secs: d.retry_wait_secs,
                max_attempts: d.max_attempts,
                accept_exit_codes: d.accept_exit_codes.clone(),
                extra_args_count: d.extra_args.len(),
                retry_output: d.retry_output,
            },
            upload: config.upload.clone(),
            supervisor: config.supervisor.clone(),
            status: config.status.clone(),
        }
    }
}
