//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the coordinator and of
//! stage actions, allowing pipeline tests without a tracker or external
//! tools.
//!
//! # Example
//!
//! ```rust,ignore
//! use warrior_core::testing::{MockAction, MockCoordinator};
//!
//! let coordinator = Arc::new(MockCoordinator::new());
//! coordinator.queue_items(["http://blip.tv/show/ep-1.flv"]).await;
//!
//! let action = Arc::new(MockAction::with_codes(vec![1, 0]));
//! // Build stages around the action and run a driver...
//! ```

mod mock_action;
mod mock_coordinator;

pub use mock_action::{MockAction, MockOutcome};
pub use mock_coordinator::{MockCoordinator, RecordedDone};

/// Test fixtures and helper functions.
pub mod fixtures {
    /// The item name used throughout the examples of the naming scheme.
    pub const BLIP_ITEM: &str = "http://blip.tv/example-show/ep-1.flv";

    /// Writes an executable `/bin/sh` script into `dir`.
    #[cfg(unix)]
    pub fn shell_script(
        dir: &std::path::Path,
        name: &str,
        body: &str,
    ) -> std::io::Result<std::path::PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }
}
