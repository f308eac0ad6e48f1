//! Rsync invocation.

use tokio::time::Instant;

use crate::item::ItemLayout;
use crate::supervisor::ProcessRequest;

use super::config::UploadConfig;

/// Builds rsync commands for finished items.
#[derive(Debug, Clone)]
pub struct RsyncUploader {
    config: UploadConfig,
}

/// Expands the coordinator-supplied target for `downloader`.
///
/// Targets may contain a `:downloader` placeholder; otherwise the nickname
/// is appended as a final path segment. The result always ends in `/`.
pub fn resolve_target(target: &str, downloader: &str) -> String {
    let target = target.trim();
    let mut resolved = if target.contains(":downloader") {
        target.replace(":downloader", downloader)
    } else {
        format!("{}/{}", target.trim_end_matches('/'), downloader)
    };
    if !resolved.ends_with('/') {
        resolved.push('/');
    }
    resolved
}

impl RsyncUploader {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// `{extra_args} {dataDir}/{fileBase} {target}`.
    pub fn build_args(&self, layout: &ItemLayout, target: &str) -> Vec<String> {
        let mut args = self.config.extra_args.clone();
        args.push(layout.final_artifact().display().to_string());
        args.push(target.to_string());
        args
    }

    /// Process request for uploading the relocated artifact.
    ///
    /// Runs from `dataDir` so relative paths on the receiving side start at
    /// the artifact name.
    pub fn request(&self, layout: &ItemLayout, target: &str, deadline: Option<Instant>) -> ProcessRequest {
        ProcessRequest::new(&self.config.rsync_path)
            .args(self.build_args(layout, target))
            .working_dir(&layout.data_dir)
            .deadline(deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    fn layout() -> ItemLayout {
        ItemLayout::new(
            Path::new("/data"),
            "ep-1.flv",
            "bliptv-20131011-120000-ep-1.flv".to_string(),
        )
    }

    #[test]
    fn test_resolve_target_placeholder() {
        assert_eq!(
            resolve_target("rsync://up.example.org/bliptv/:downloader/", "alice"),
            "rsync://up.example.org/bliptv/alice/"
        );
    }

    #[test]
    fn test_resolve_target_appends_downloader() {
        assert_eq!(
            resolve_target("rsync://up.example.org/bliptv/\n", "alice"),
            "rsync://up.example.org/bliptv/alice/"
        );
        assert_eq!(
            resolve_target("rsync://up.example.org/bliptv", "alice"),
            "rsync://up.example.org/bliptv/alice/"
        );
    }

    #[test]
    fn test_build_args() {
        let uploader = RsyncUploader::new(UploadConfig::default());
        let args = uploader.build_args(&layout(), "rsync://up/bliptv/alice/");
        assert_eq!(
            args,
            vec![
                "--recursive",
                "--partial",
                "--partial-dir",
                ".rsync-tmp",
                "/data/bliptv-20131011-120000-ep-1.flv",
                "rsync://up/bliptv/alice/",
            ]
        );
    }

    #[test]
    fn test_request_runs_from_data_dir() {
        let uploader = RsyncUploader::new(UploadConfig::default());
        let request = uploader.request(&layout(), "rsync://up/x/", None);
        assert_eq!(request.program, PathBuf::from("rsync"));
        assert_eq!(request.working_dir, Some(PathBuf::from("/data")));
    }
}
