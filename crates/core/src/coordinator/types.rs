//! Types shared by coordinator implementations.

use serde::Serialize;

/// Protocol version sent with every request.
pub const API_VERSION: &str = "2";

/// Who is asking: the warrior nickname and the pipeline version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinatorIdentity {
    pub downloader: String,
    pub version: String,
}

impl CoordinatorIdentity {
    pub fn new(downloader: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            downloader: downloader.into(),
            version: version.into(),
        }
    }
}
