//! Readable side of a child's combined output.

use std::io;
#[cfg(unix)]
use std::{fs::File, io::Read};

#[cfg(unix)]
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{ChildStderr, ChildStdout};

#[cfg(unix)]
use super::pty;

const READ_CHUNK: usize = 8192;

pub(crate) enum OutputChannel {
    /// Non-blocking pty master registered with the runtime's reactor.
    #[cfg(unix)]
    Pty(AsyncFd<File>),
    Pipe {
        stdout: Option<ChildStdout>,
        stderr: Option<ChildStderr>,
    },
}

impl OutputChannel {
    /// Waits until output is readable and returns the next chunk, or `None`
    /// once every stream has closed.
    ///
    /// Cancel safe: no bytes are consumed unless the future completes.
    pub async fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        match self {
            #[cfg(unix)]
            Self::Pty(fd) => read_pty(fd).await,
            Self::Pipe { stdout, stderr } => read_pipes(stdout, stderr).await,
        }
    }
}

#[cfg(unix)]
async fn read_pty(fd: &AsyncFd<File>) -> io::Result<Option<Vec<u8>>> {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let mut guard = fd.readable().await?;
        let result = guard.try_io(|inner| {
            let mut master: &File = inner.get_ref();
            master.read(&mut buf)
        });
        match result {
            Ok(Ok(0)) => return Ok(None),
            Ok(Ok(n)) => return Ok(Some(buf[..n].to_vec())),
            Ok(Err(e)) if pty::is_hangup(&e) => return Ok(None),
            Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
            Ok(Err(e)) => return Err(e),
            // Spurious readiness; the guard cleared it.
            Err(_would_block) => continue,
        }
    }
}

enum Stream {
    Stdout,
    Stderr,
}

async fn read_pipes(
    stdout: &mut Option<ChildStdout>,
    stderr: &mut Option<ChildStderr>,
) -> io::Result<Option<Vec<u8>>> {
    let mut out_buf = [0u8; READ_CHUNK];
    let mut err_buf = [0u8; READ_CHUNK];

    loop {
        if stdout.is_none() && stderr.is_none() {
            return Ok(None);
        }

        let (stream, result) = tokio::select! {
            r = read_open(stdout, &mut out_buf) => (Stream::Stdout, r),
            r = read_open(stderr, &mut err_buf) => (Stream::Stderr, r),
        };

        let n = result?;
        match (stream, n) {
            (Stream::Stdout, 0) => *stdout = None,
            (Stream::Stderr, 0) => *stderr = None,
            (Stream::Stdout, n) => return Ok(Some(out_buf[..n].to_vec())),
            (Stream::Stderr, n) => return Ok(Some(err_buf[..n].to_vec())),
        }
    }
}

/// Reads from an open stream; never resolves for a closed one.
async fn read_open<R: AsyncRead + Unpin>(reader: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize> {
    match reader {
        Some(r) => r.read(buf).await,
        None => std::future::pending().await,
    }
}
