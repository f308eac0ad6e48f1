//! Coordinator client.
//!
//! The coordinator hands out item names and receives completion reports.
//! [`HttpCoordinator`] speaks the tracker HTTP protocol; tests use
//! [`crate::testing::MockCoordinator`].

mod config;
mod error;
mod http;
mod traits;
mod types;

pub use config::CoordinatorConfig;
pub use error::CoordinatorError;
pub use http::HttpCoordinator;
pub use traits::Coordinator;
pub use types::{CoordinatorIdentity, API_VERSION};
