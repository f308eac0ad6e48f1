//! Asynchronous supervision of external processes.
//!
//! The [`ProcessSupervisor`] spawns one process per invocation with a
//! pseudo-terminal (or a pair of pipes) as its combined output, drains that
//! output without blocking as the runtime reports it readable, and checks for
//! process exit on a fixed interval. It has no retry logic and no timeout of
//! its own: a caller-supplied deadline is the only way a process is killed.
//!
//! # Example
//!
//! ```ignore
//! use warrior_core::supervisor::{ProcessRequest, ProcessSupervisor, SupervisorConfig};
//!
//! let supervisor = ProcessSupervisor::new(SupervisorConfig::default());
//! let request = ProcessRequest::new("/usr/bin/wget-lua").arg("--version");
//! let handle = supervisor.run(request, None).await?;
//! println!("exit {:?}: {}", handle.exit_code, handle.output_lossy());
//! ```

mod capture;
mod channel;
mod config;
mod error;
mod process;
#[cfg(unix)]
mod pty;
mod types;

pub use config::{SupervisorConfig, Transport};
pub use error::SupervisorError;
pub use process::ProcessSupervisor;
pub use types::{OutputSink, ProcessHandle, ProcessRequest};
