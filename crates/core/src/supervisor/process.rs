//! Process supervisor implementation.

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::{interval, sleep_until, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::io::unix::AsyncFd;

use crate::metrics;

use super::capture::OutputCapture;
use super::channel::OutputChannel;
use super::config::{SupervisorConfig, Transport};
use super::error::SupervisorError;
#[cfg(unix)]
use super::pty;
use super::types::{OutputSink, ProcessHandle, ProcessRequest};

/// Spawns and monitors external processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessSupervisor {
    config: SupervisorConfig,
}

enum Event {
    Output(io::Result<Option<Vec<u8>>>),
    Tick,
    Deadline,
}

impl ProcessSupervisor {
    /// Creates a new supervisor with the given configuration.
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Runs one process to completion.
    ///
    /// Output is drained into `sink` (and retained in the returned handle) as
    /// soon as it becomes readable; exit is checked every poll interval. After
    /// exit one final drain collects output produced between the last read
    /// and process death, then the output descriptors are released.
    pub async fn run(
        &self,
        request: ProcessRequest,
        sink: Option<OutputSink>,
    ) -> Result<ProcessHandle, SupervisorError> {
        let (mut child, mut channel) = self.spawn(&request)?;
        let pid = child.id().unwrap_or_default();
        metrics::PROCESSES_SPAWNED.inc();
        info!(pid, program = %request.program.display(), "Spawned process");

        // Every field the completion check relies on is set before the first tick.
        let mut capture = OutputCapture::new(pid, self.config.output_buffer_limit, sink);
        let mut ticker = interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut output_open = true;

        let status = loop {
            let event = tokio::select! {
                chunk = channel.read_chunk(), if output_open => Event::Output(chunk),
                _ = ticker.tick() => Event::Tick,
                _ = wait_until(request.deadline) => Event::Deadline,
            };

            match event {
                Event::Output(Ok(Some(chunk))) => capture.push(&chunk),
                Event::Output(Ok(None)) => output_open = false,
                Event::Output(Err(e)) => {
                    warn!(pid, error = %e, "Failed to read process output");
                    output_open = false;
                }
                Event::Tick => match child.try_wait() {
                    Ok(Some(status)) => break status,
                    Ok(None) => {}
                    Err(source) => return Err(SupervisorError::Wait { pid, source }),
                },
                Event::Deadline => {
                    warn!(pid, "Process exceeded its deadline, killing");
                    if let Err(e) = child.kill().await {
                        warn!(pid, error = %e, "Failed to kill process");
                    }
                    if output_open {
                        self.drain_remaining(&mut channel, &mut capture, pid).await;
                    }
                    let (output, _) = capture.finish();
                    return Err(SupervisorError::DeadlineExceeded { pid, output });
                }
            }
        };

        if output_open {
            self.drain_remaining(&mut channel, &mut capture, pid).await;
        }
        drop(channel);

        let exit_code = exit_code(status);
        let (combined_output, discarded_bytes) = capture.finish();
        info!(pid, exit_code, bytes = combined_output.len(), "Process exited");

        Ok(ProcessHandle {
            pid,
            exit_code: Some(exit_code),
            combined_output,
            discarded_bytes,
        })
    }

    /// Reads whatever is still buffered after exit, bounded by one poll interval
    /// in case a surviving grandchild keeps the output open.
    async fn drain_remaining(&self, channel: &mut OutputChannel, capture: &mut OutputCapture, pid: u32) {
        let grace = self.config.poll_interval().max(Duration::from_millis(50));
        let deadline = Instant::now() + grace;
        loop {
            match timeout_at(deadline, channel.read_chunk()).await {
                Ok(Ok(Some(chunk))) => capture.push(&chunk),
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    warn!(pid, error = %e, "Failed to drain process output");
                    break;
                }
                Err(_) => {
                    debug!(pid, "Output still open after exit, stopping drain");
                    break;
                }
            }
        }
    }

    fn spawn(&self, request: &ProcessRequest) -> Result<(Child, OutputChannel), SupervisorError> {
        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &request.working_dir {
            command.current_dir(dir);
        }

        match self.config.transport {
            #[cfg(unix)]
            Transport::Pty => spawn_pty(command, &request.program),
            #[cfg(not(unix))]
            Transport::Pty => {
                warn!("Pseudo-terminals are unavailable on this platform, using pipes");
                spawn_pipes(command, &request.program)
            }
            Transport::Pipe => spawn_pipes(command, &request.program),
        }
    }
}

#[cfg(unix)]
fn spawn_pty(mut command: Command, program: &Path) -> Result<(Child, OutputChannel), SupervisorError> {
    let pty = pty::open().map_err(SupervisorError::Pty)?;
    let stdout = pty.slave.try_clone().map_err(SupervisorError::Pty)?;
    command.stdout(Stdio::from(stdout)).stderr(Stdio::from(pty.slave));

    let child = command.spawn().map_err(|source| spawn_error(program, source))?;
    // The builder owns the parent's copies of the slave; the master only sees
    // a hangup once they are closed.
    drop(command);

    let master = AsyncFd::new(pty.master).map_err(SupervisorError::Pty)?;
    Ok((child, OutputChannel::Pty(master)))
}

fn spawn_pipes(mut command: Command, program: &Path) -> Result<(Child, OutputChannel), SupervisorError> {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = command.spawn().map_err(|source| spawn_error(program, source))?;
    let channel = OutputChannel::Pipe {
        stdout: child.stdout.take(),
        stderr: child.stderr.take(),
    };
    Ok((child, channel))
}

fn spawn_error(program: &Path, source: io::Error) -> SupervisorError {
    SupervisorError::Spawn {
        program: program.to_path_buf(),
        source,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(-1)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn sh(script: &str) -> ProcessRequest {
        ProcessRequest::new("/bin/sh").arg("-c").arg(script)
    }

    fn supervisor(transport: Transport) -> ProcessSupervisor {
        ProcessSupervisor::new(
            SupervisorConfig::default()
                .with_transport(transport)
                .with_poll_interval(Duration::from_millis(20)),
        )
    }

    #[tokio::test]
    async fn test_pty_captures_combined_output_and_exit_code() {
        let handle = supervisor(Transport::Pty)
            .run(sh("echo out; echo err 1>&2; exit 3"), None)
            .await
            .unwrap();
        assert_eq!(handle.exit_code, Some(3));
        let output = handle.output_lossy();
        assert!(output.contains("out"), "output was {output:?}");
        assert!(output.contains("err"), "output was {output:?}");
        assert!(handle.pid > 0);
    }

    #[tokio::test]
    async fn test_pipe_captures_combined_output_and_exit_code() {
        let handle = supervisor(Transport::Pipe)
            .run(sh("echo out; echo err 1>&2; exit 0"), None)
            .await
            .unwrap();
        assert_eq!(handle.exit_code, Some(0));
        let output = handle.output_lossy();
        assert!(output.contains("out\n"));
        assert!(output.contains("err\n"));
    }

    #[tokio::test]
    async fn test_spawn_missing_program_fails_immediately() {
        let err = supervisor(Transport::Pty)
            .run(ProcessRequest::new("/nonexistent/wget-lua"), None)
            .await
            .unwrap_err();
        assert!(err.is_spawn());
    }

    #[tokio::test]
    async fn test_final_drain_keeps_unterminated_output() {
        for transport in [Transport::Pty, Transport::Pipe] {
            let handle = supervisor(transport).run(sh("printf last"), None).await.unwrap();
            assert!(handle.output_lossy().ends_with("last"), "{transport:?}");
        }
    }

    #[tokio::test]
    async fn test_fast_writer_does_not_stall_exit_detection() {
        let supervisor = ProcessSupervisor::new(
            SupervisorConfig::default()
                .with_poll_interval(Duration::from_millis(250))
                .with_output_limit(64 * 1024),
        );
        let handle = timeout(
            Duration::from_secs(20),
            supervisor.run(sh("yes | head -n 200000"), None),
        )
        .await
        .expect("supervisor stalled")
        .unwrap();

        assert_eq!(handle.exit_code, Some(0));
        assert_eq!(handle.combined_output.len(), 64 * 1024);
        // "y\n" becomes "y\r\n" through the terminal line discipline.
        let total = handle.combined_output.len() as u64 + handle.discarded_bytes;
        assert_eq!(total, 200_000 * 3);
    }

    #[tokio::test]
    async fn test_deadline_kills_process() {
        let request = sh("echo started; sleep 30")
            .deadline(Some(Instant::now() + Duration::from_millis(300)));
        let err = timeout(Duration::from_secs(5), supervisor(Transport::Pty).run(request, None))
            .await
            .expect("deadline not enforced")
            .unwrap_err();
        match err {
            SupervisorError::DeadlineExceeded { output, .. } => {
                assert!(String::from_utf8_lossy(&output).contains("started"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_sink_receives_output() {
        let (tx, mut rx) = mpsc::channel(16);
        let handle = supervisor(Transport::Pipe)
            .run(sh("echo streamed"), Some(tx))
            .await
            .unwrap();
        assert_eq!(handle.exit_code, Some(0));

        let mut received = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            received.extend(chunk);
        }
        assert_eq!(received, b"streamed\n");
    }

    #[tokio::test]
    async fn test_working_dir_is_applied() {
        let dir = tempfile::TempDir::new().unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        let handle = supervisor(Transport::Pipe)
            .run(sh("pwd -P").working_dir(dir.path()), None)
            .await
            .unwrap();
        assert_eq!(handle.output_lossy().trim(), canonical.to_string_lossy());
    }

    #[tokio::test]
    async fn test_signal_death_maps_to_128_plus_signal() {
        let handle = supervisor(Transport::Pipe)
            .run(sh("kill -9 $$"), None)
            .await
            .unwrap();
        assert_eq!(handle.exit_code, Some(128 + 9));
    }
}
