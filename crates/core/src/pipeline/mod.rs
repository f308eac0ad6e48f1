//! The concrete archiving pipeline.
//!
//! [`build_stages`] assembles the fixed stage sequence (prepare, download,
//! stats, relocate, upload, report) and [`PipelineDriver`] keeps several
//! items moving through it at once.

mod config;
mod driver;
mod stages;
mod status;

pub use config::WorkerConfig;
pub use driver::{DriverSettings, PipelineDriver, RunSummary};
pub use stages::{
    build_stages, Download, MoveFiles, PipelineParts, PrepareDirectories, PrepareStats, SendDone,
    Upload, DOWNLOAD, MOVE_FILES, PREPARE_DIRECTORIES, PREPARE_STATS, SEND_DONE, UPLOAD,
};
pub use status::{PipelineMonitor, PipelineStatus};
