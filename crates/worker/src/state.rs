use chrono::{DateTime, Utc};
use std::sync::Arc;
use warrior_core::{Config, GateRegistry, GateStatus, PipelineMonitor, PipelineStatus, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    monitor: Arc<PipelineMonitor>,
    gates: Arc<GateRegistry>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, monitor: Arc<PipelineMonitor>, gates: Arc<GateRegistry>) -> Self {
        Self {
            config,
            monitor,
            gates,
            started_at: Utc::now(),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn project(&self) -> &str {
        &self.config.project.name
    }

    pub fn pipeline_status(&self) -> PipelineStatus {
        self.monitor.status()
    }

    pub fn gate_status(&self) -> Vec<GateStatus> {
        self.gates.status()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
