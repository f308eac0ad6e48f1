//! Wget+Lua discovery and argument building.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::item::ItemLayout;
use crate::supervisor::{ProcessRequest, ProcessSupervisor};

use super::config::DownloaderConfig;
use super::error::DownloaderError;

/// Upper bound on a `--version` probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// A located wget-lua executable plus the settings for invoking it.
#[derive(Debug, Clone)]
pub struct WgetDownloader {
    executable: PathBuf,
    config: DownloaderConfig,
}

impl WgetDownloader {
    pub fn new(executable: impl Into<PathBuf>, config: DownloaderConfig) -> Self {
        Self {
            executable: executable.into(),
            config,
        }
    }

    /// Uses the first candidate that runs and reports the required version.
    pub async fn discover(
        config: DownloaderConfig,
        supervisor: &ProcessSupervisor,
    ) -> Result<Self, DownloaderError> {
        for candidate in &config.candidates {
            if probe(supervisor, candidate, &config.required_version).await {
                info!(path = %candidate.display(), "Found usable Wget+Lua");
                return Ok(Self::new(candidate.clone(), config));
            }
        }
        Err(DownloaderError::NotFound {
            required: config.required_version.clone(),
            tried: config.candidates.clone(),
        })
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    /// Arguments for downloading `url` into `layout`.
    pub fn build_args(&self, layout: &ItemLayout, url: &str) -> Vec<String> {
        let c = &self.config;
        let mut args = vec![
            "-U".to_string(),
            c.user_agent.clone(),
            "-o".to_string(),
            layout.download_log().display().to_string(),
            "--no-check-certificate".to_string(),
            "--truncate-output".to_string(),
            "--output-document".to_string(),
            layout.work_artifact().display().to_string(),
            "-e".to_string(),
            "robots=off".to_string(),
            "--rotate-dns".to_string(),
            "--timeout".to_string(),
            c.timeout_secs.to_string(),
            "--level=inf".to_string(),
            "--tries".to_string(),
            c.tries.to_string(),
            "--waitretry".to_string(),
            c.retry_wait_secs.to_string(),
        ];
        args.extend(c.extra_args.iter().cloned());
        args.push(url.to_string());
        args
    }

    /// Process request for one download attempt.
    pub fn request(&self, layout: &ItemLayout, url: &str, deadline: Option<Instant>) -> ProcessRequest {
        ProcessRequest::new(&self.executable)
            .args(self.build_args(layout, url))
            .working_dir(&layout.work_dir)
            .deadline(deadline)
    }
}

async fn probe(supervisor: &ProcessSupervisor, path: &Path, required: &str) -> bool {
    let request = ProcessRequest::new(path)
        .arg("--version")
        .deadline(Some(Instant::now() + PROBE_TIMEOUT));

    match supervisor.run(request, None).await {
        Ok(handle) if handle.exited_with(&[0]) => {
            let matched = handle.output_lossy().contains(required);
            if !matched {
                debug!(path = %path.display(), "Candidate reports a different version");
            }
            matched
        }
        Ok(handle) => {
            debug!(path = %path.display(), code = ?handle.exit_code, "Candidate --version failed");
            false
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Candidate not usable");
            false
        }
    }
}
