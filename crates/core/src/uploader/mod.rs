//! Rsync upload of finished artifacts.

mod config;
mod rsync;

pub use config::{UploadConfig, MAX_UPLOAD_CONCURRENCY};
pub use rsync::{resolve_target, RsyncUploader};
