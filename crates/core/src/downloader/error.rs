//! Downloader errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloaderError {
    #[error("No usable Wget+Lua found (wanted {required:?}, tried {tried:?})")]
    NotFound {
        required: String,
        tried: Vec<PathBuf>,
    },
}
