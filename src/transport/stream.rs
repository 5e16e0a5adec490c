//! Stream Framer: line-delimited JSON framing on stdout, and the
//! append-only stderr buffer with a per-test read cursor.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::ChildStdout;
use tracing::debug;

/// Parses one JSON object per line out of child stdout. Lines that fail to
/// parse, or parse to something other than a JSON object, are routed to a
/// diagnostic sink rather than blocking message processing.
pub struct StreamFramer;

#[derive(Debug, Clone)]
pub enum Frame {
    Message(serde_json::Value),
    /// A non-JSON or non-object line — "protocol noise".
    Noise(String),
    Eof,
}

impl StreamFramer {
    /// Read and classify the next line from stdout.
    pub async fn next_frame(
        stdout: &Arc<tokio::sync::Mutex<BufReader<ChildStdout>>>,
    ) -> std::io::Result<Frame> {
        let mut reader = stdout.lock().await;
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            return Ok(Frame::Eof);
        }

        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            return Ok(Frame::Noise(String::new()));
        }

        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(value) if value.is_object() => Ok(Frame::Message(value)),
            Ok(_) => {
                debug!("skipping non-object JSON on stdout: {trimmed}");
                Ok(Frame::Noise(trimmed.to_string()))
            }
            Err(_) => {
                debug!("skipping non-JSON stdout line: {trimmed}");
                Ok(Frame::Noise(trimmed.to_string()))
            }
        }
    }
}

/// An append-only byte buffer for stderr, with a monotonically advancing
/// read cursor. Cloning shares the same underlying buffer (`Arc` inside).
#[derive(Clone)]
pub struct StderrBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl StderrBuffer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, bytes: &[u8]) {
        self.inner.lock().extend_from_slice(bytes);
    }

    /// Current buffer length; used as a cursor value.
    pub fn cursor(&self) -> usize {
        self.inner.lock().len()
    }

    /// Bytes written since `cursor`, and the new cursor (current end).
    pub fn since(&self, cursor: usize) -> (Vec<u8>, usize) {
        let buf = self.inner.lock();
        let end = buf.len();
        if cursor >= end {
            (Vec::new(), end)
        } else {
            (buf[cursor..end].to_vec(), end)
        }
    }

    pub fn tail(&self, max_bytes: usize) -> String {
        let buf = self.inner.lock();
        let start = buf.len().saturating_sub(max_bytes);
        String::from_utf8_lossy(&buf[start..]).to_string()
    }
}

impl Default for StderrBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_isolates_windows() {
        let buffer = StderrBuffer::new();
        buffer.push(b"WARN:a\n");
        let cursor = buffer.cursor();

        // Next test starts here; nothing written yet since cursor.
        let (bytes, _) = buffer.since(cursor);
        assert!(bytes.is_empty());

        buffer.push(b"WARN:b\n");
        let (bytes, new_cursor) = buffer.since(cursor);
        assert_eq!(bytes, b"WARN:b\n");
        assert_eq!(new_cursor, buffer.cursor());
    }

    #[test]
    fn cursor_never_sees_earlier_bytes() {
        let buffer = StderrBuffer::new();
        buffer.push(b"before\n");
        let cursor = buffer.cursor();
        buffer.push(b"after\n");
        let (bytes, _) = buffer.since(cursor);
        assert_eq!(bytes, b"after\n");
    }
}
