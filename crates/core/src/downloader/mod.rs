//! Wget+Lua downloader.
//!
//! Locates a usable `wget-lua` build at startup and turns an item's layout
//! into the argument list for one download attempt.

mod config;
mod error;
mod wget;

pub use config::{DownloaderConfig, RetryOutput};
pub use error::DownloaderError;
pub use wget::WgetDownloader;
