use crate::uploader::MAX_UPLOAD_CONCURRENCY;

use super::{types::Config, ConfigError};

fn invalid(message: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(message.into()))
}

/// Validate configuration
/// Currently validates:
/// - Project identity is present and the file prefix is a single path component
/// - Upload concurrency is within 1..=4
/// - Download retry policy allows at least one attempt and accepts some code
/// - Worker concurrency and supervisor poll interval are non-zero
/// - Status port is not 0 when the status server is enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Project validation
    if config.project.name.trim().is_empty() {
        return invalid("project.name cannot be empty");
    }
    if config.project.downloader.trim().is_empty() {
        return invalid("project.downloader cannot be empty");
    }
    let prefix = &config.project.file_prefix;
    if prefix.is_empty() || prefix.contains('/') {
        return invalid("project.file_prefix must be non-empty and contain no '/'");
    }

    // Coordinator validation
    if !config.coordinator.url.contains("://") {
        return invalid(format!(
            "coordinator.url must be an absolute URL, got {:?}",
            config.coordinator.url
        ));
    }

    // Upload validation
    let concurrency = config.upload.concurrency;
    if !(1..=MAX_UPLOAD_CONCURRENCY).contains(&concurrency) {
        return invalid(format!(
            "upload.concurrency must be between 1 and {}, got {}",
            MAX_UPLOAD_CONCURRENCY, concurrency
        ));
    }

    // Downloader validation
    if config.downloader.max_attempts == 0 {
        return invalid("downloader.max_attempts must be at least 1");
    }
    if config.downloader.accept_exit_codes.is_empty() {
        return invalid("downloader.accept_exit_codes cannot be empty");
    }
    if config.downloader.candidates.is_empty() {
        return invalid("downloader.candidates cannot be empty");
    }

    // Worker validation
    if config.worker.concurrent_items == 0 {
        return invalid("worker.concurrent_items must be at least 1");
    }
    if config.worker.item_deadline_secs == Some(0) {
        return invalid("worker.item_deadline_secs cannot be 0");
    }

    // Supervisor validation
    if config.supervisor.poll_interval_ms == 0 {
        return invalid("supervisor.poll_interval_ms cannot be 0");
    }

    // Status validation
    if config.status.enabled && config.status.port == 0 {
        return invalid("status.port cannot be 0");
    }

    Ok(())
}
