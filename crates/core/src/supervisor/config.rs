//! Configuration for the process supervisor.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a child's combined output is connected to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// A pseudo-terminal shared by stdout and stderr (line-buffered child output).
    #[default]
    Pty,
    /// Separate stdout/stderr pipes merged by the supervisor.
    Pipe,
}

/// Configuration for the process supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Interval between process exit checks in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Output transport.
    #[serde(default)]
    pub transport: Transport,

    /// Maximum combined output retained per process, in bytes.
    /// Older output is discarded first.
    #[serde(default = "default_output_buffer_limit")]
    pub output_buffer_limit: usize,
}

fn default_poll_interval() -> u64 {
    250
}

fn default_output_buffer_limit() -> usize {
    1024 * 1024
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            transport: Transport::default(),
            output_buffer_limit: default_output_buffer_limit(),
        }
    }
}

impl SupervisorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Sets the transport.
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the exit poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Sets the retained output limit.
    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_buffer_limit = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SupervisorConfig::default();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.transport, Transport::Pty);
        assert_eq!(config.output_buffer_limit, 1024 * 1024);
    }

    #[test]
    fn test_deserialize_transport() {
        let config: SupervisorConfig = toml::from_str(r#"transport = "pipe""#).unwrap();
        assert_eq!(config.transport, Transport::Pipe);
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }
}
