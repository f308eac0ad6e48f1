//! Bounded accumulation of a child's combined output.

use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use super::types::OutputSink;

pub(crate) struct OutputCapture {
    buffer: Vec<u8>,
    limit: usize,
    discarded: u64,
    sink: Option<OutputSink>,
    /// Partial line held back for logging when there is no sink.
    pending_line: Vec<u8>,
    pid: u32,
}

impl OutputCapture {
    pub fn new(pid: u32, limit: usize, sink: Option<OutputSink>) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
            discarded: 0,
            sink,
            pending_line: Vec::new(),
            pid,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }

        self.buffer.extend_from_slice(chunk);
        if self.buffer.len() > self.limit {
            let excess = self.buffer.len() - self.limit;
            self.buffer.drain(..excess);
            self.discarded += excess as u64;
        }

        match &self.sink {
            Some(sink) => match sink.try_send(chunk.to_vec()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(pid = self.pid, "output sink full, dropping {} bytes", chunk.len());
                }
                Err(TrySendError::Closed(_)) => {
                    self.sink = None;
                }
            },
            None => self.log_lines(chunk),
        }
    }

    fn log_lines(&mut self, chunk: &[u8]) {
        self.pending_line.extend_from_slice(chunk);
        while let Some(pos) = self.pending_line.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending_line.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            if !text.is_empty() {
                debug!(pid = self.pid, "{}", text);
            }
        }
    }

    /// Returns the retained output and the number of discarded bytes.
    pub fn finish(mut self) -> (Vec<u8>, u64) {
        if !self.pending_line.is_empty() {
            let text = String::from_utf8_lossy(&self.pending_line).into_owned();
            debug!(pid = self.pid, "{}", text.trim_end_matches('\r'));
        }
        (std::mem::take(&mut self.buffer), self.discarded)
    }
}
