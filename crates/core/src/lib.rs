pub mod config;
pub mod coordinator;
pub mod downloader;
pub mod gate;
pub mod item;
pub mod metrics;
pub mod pipeline;
pub mod stage;
pub mod supervisor;
pub mod testing;
pub mod uploader;
pub mod workspace;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use coordinator::{Coordinator, CoordinatorError, CoordinatorIdentity, HttpCoordinator};
pub use downloader::{DownloaderError, WgetDownloader};
pub use gate::{ConcurrencyGate, GateError, GateRegistry, GateStatus, UPLOAD_GATE};
pub use item::{Item, ItemPhase, ItemSnapshot, ItemStats, ItemStatus};
pub use pipeline::{PipelineDriver, PipelineMonitor, PipelineStatus, RunSummary};
pub use stage::{RetryPolicy, Stage, StageEngine, StageError, StageKind};
pub use supervisor::{ProcessHandle, ProcessRequest, ProcessSupervisor, SupervisorError};
pub use workspace::{WorkspaceError, WorkspaceManager};
