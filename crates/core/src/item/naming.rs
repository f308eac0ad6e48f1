//! Deterministic naming derived from an item's URL.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::workspace::WorkspaceError;

/// strftime pattern used for the timestamp component of a file base.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// A validated item name: a URL with a scheme, a path and a file component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemName {
    raw: String,
    file_id_start: usize,
}

impl ItemName {
    /// Validates `raw` and locates its file component.
    pub fn parse(raw: &str) -> Result<Self, WorkspaceError> {
        let invalid = |reason: &str| WorkspaceError::InvalidItemName {
            name: raw.to_string(),
            reason: reason.to_string(),
        };

        let Some(scheme_end) = raw.find("://") else {
            return Err(invalid("missing scheme separator"));
        };
        if scheme_end == 0 {
            return Err(invalid("empty scheme"));
        }

        let after_scheme = &raw[scheme_end + 3..];
        let Some(host_end) = after_scheme.find('/') else {
            return Err(invalid("missing path separator after host"));
        };
        if host_end == 0 {
            return Err(invalid("empty host"));
        }

        // `raw` contains at least the '/' found above.
        let file_id_start = raw.rfind('/').map(|i| i + 1).unwrap_or(raw.len());
        let id = &raw[file_id_start..];
        if id.is_empty() {
            return Err(invalid("missing file name component"));
        }
        if id == "." || id == ".." {
            return Err(invalid("file name component is a relative path"));
        }

        Ok(Self {
            raw: raw.to_string(),
            file_id_start,
        })
    }

    /// The final path segment of the name.
    pub fn file_id(&self) -> &str {
        &self.raw[self.file_id_start..]
    }
}

impl std::fmt::Display for ItemName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// `{prefix}-{YYYYMMDD-HHMMSS}-{file_id}`.
pub fn file_base(prefix: &str, timestamp: NaiveDateTime, file_id: &str) -> String {
    format!("{}-{}-{}", prefix, timestamp.format(TIMESTAMP_FORMAT), file_id)
}

/// Paths allocated for an item by the workspace manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemLayout {
    /// Shared output area (`dataDir`).
    pub data_dir: PathBuf,
    /// Exclusive working directory, `{dataDir}/{fileId}`.
    pub work_dir: PathBuf,
    pub file_id: String,
    pub file_base: String,
}

impl ItemLayout {
    pub fn new(data_dir: &Path, file_id: &str, file_base: String) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            work_dir: data_dir.join(file_id),
            file_id: file_id.to_string(),
            file_base,
        }
    }

    /// Where the downloader writes: `{workDir}/{fileBase}`.
    pub fn work_artifact(&self) -> PathBuf {
        self.work_dir.join(&self.file_base)
    }

    /// Where the artifact lives after relocation: `{dataDir}/{fileBase}`.
    pub fn final_artifact(&self) -> PathBuf {
        self.data_dir.join(&self.file_base)
    }

    /// Downloader log file inside the working directory.
    pub fn download_log(&self) -> PathBuf {
        self.work_dir.join("wget.log")
    }
}
