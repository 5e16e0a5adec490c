//! Process Supervisor: spawns and stops the server-under-test child process.

use crate::types::ServerDescriptor;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// How long `stop()` waits for the child to exit on its own before
/// escalating to a forced kill.
const GRACEFUL_STOP_WINDOW: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to spawn process: {0}")]
    Spawn(std::io::Error),

    #[error("startup timed out after {0}ms")]
    Timeout(u64),

    #[error("process exited during startup (code={code:?}, signal={signal:?}): {stderr_tail}")]
    EarlyExit {
        code: Option<i32>,
        signal: Option<i32>,
        stderr_tail: String,
    },
}

/// A spawned child process with piped stdin/stdout/stderr.
pub struct ProcessHandle {
    pid: Option<u32>,
    child: Arc<Mutex<Child>>,
    stdin: Arc<Mutex<ChildStdin>>,
    stdout: Arc<Mutex<BufReader<ChildStdout>>>,
    healthy: Arc<AtomicBool>,
}

impl ProcessHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub(crate) fn stdin(&self) -> Arc<Mutex<ChildStdin>> {
        self.stdin.clone()
    }

    pub(crate) fn stdout(&self) -> Arc<Mutex<BufReader<ChildStdout>>> {
        self.stdout.clone()
    }

    pub async fn is_running(&self) -> bool {
        let mut child = self.child.lock().await;
        match child.try_wait() {
            Ok(Some(_)) => {
                self.healthy.store(false, Ordering::Relaxed);
                false
            }
            Ok(None) => self.healthy.load(Ordering::Relaxed),
            Err(e) => {
                error!("failed to poll process status: {e}");
                false
            }
        }
    }

    /// Close stdin, wait briefly for a natural exit, then escalate to a
    /// forced kill. Idempotent.
    pub async fn stop(&self) {
        if !self.healthy.swap(false, Ordering::Relaxed) {
            return;
        }

        {
            let mut stdin = self.stdin.lock().await;
            let _ = stdin.shutdown().await;
        }

        let mut child = self.child.lock().await;
        let waited = tokio::time::timeout(GRACEFUL_STOP_WINDOW, child.wait()).await;
        if waited.is_err() {
            warn!("process did not exit within grace period, killing");
            let _ = child.kill().await;
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        let child = self.child.clone();
        tokio::spawn(async move {
            let mut guard = child.lock().await;
            let _ = guard.start_kill();
        });
    }
}

/// Spawns a process per [`ServerDescriptor`] and waits for readiness.
///
/// Readiness is declared synchronously after a successful spawn when no
/// `readyPattern` is configured; otherwise the supervisor scans stderr
/// lines until the pattern matches, the process exits, or the startup
/// timeout elapses.
pub struct ProcessSupervisor;

impl ProcessSupervisor {
    pub async fn start(
        descriptor: &ServerDescriptor,
    ) -> Result<(ProcessHandle, super::stream::StderrBuffer), StartupError> {
        let mut command = Command::new(&descriptor.command);
        command
            .args(&descriptor.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &descriptor.cwd {
            command.current_dir(cwd);
        }

        // Config env wins over inherited process env per key.
        for (key, value) in &descriptor.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(StartupError::Spawn)?;
        let pid = child.id();

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let stderr_buffer = super::stream::StderrBuffer::new();
        let ready_pattern = match &descriptor.ready_pattern {
            Some(pattern) => {
                Some(regex::Regex::new(pattern).expect("validated at config load"))
            }
            None => None,
        };

        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(drain_stderr(stderr, stderr_buffer.clone(), ready_pattern, ready_tx));

        let healthy = Arc::new(AtomicBool::new(true));
        let child = Arc::new(Mutex::new(child));

        if descriptor.ready_pattern.is_some() {
            let timeout = Duration::from_millis(descriptor.startup_timeout_ms);
            match tokio::time::timeout(timeout, ready_rx).await {
                Ok(Ok(())) => {
                    info!("server '{}' signalled readiness via stderr pattern", descriptor.name);
                }
                Ok(Err(_)) => {
                    // sender dropped: drain task observed EOF before matching.
                    let status = child.lock().await.try_wait().ok().flatten();
                    return Err(StartupError::EarlyExit {
                        code: status.and_then(|s| s.code()),
                        signal: unix_signal(status),
                        stderr_tail: stderr_buffer.tail(4096),
                    });
                }
                Err(_) => {
                    return Err(StartupError::Timeout(descriptor.startup_timeout_ms));
                }
            }
        } else {
            debug!("server '{}' declared ready synchronously after spawn", descriptor.name);
        }

        let handle = ProcessHandle {
            pid,
            child,
            stdin: Arc::new(Mutex::new(stdin)),
            stdout: Arc::new(Mutex::new(BufReader::new(stdout))),
            healthy,
        };

        Ok((handle, stderr_buffer))
    }
}

#[cfg(unix)]
fn unix_signal(status: Option<std::process::ExitStatus>) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.and_then(|s| s.signal())
}

#[cfg(not(unix))]
fn unix_signal(_status: Option<std::process::ExitStatus>) -> Option<i32> {
    None
}

/// Background task that continuously drains stderr into the shared buffer
/// and fires the ready channel the first time `pattern` matches a line.
///
/// STDIO MCP servers print startup logs to stderr; if nobody reads them the
/// pipe buffer fills up and the process blocks on the write. This task
/// exists purely to keep that pipe empty.
async fn drain_stderr(
    stderr: ChildStderr,
    buffer: super::stream::StderrBuffer,
    ready_pattern: Option<regex::Regex>,
    ready_tx: tokio::sync::oneshot::Sender<()>,
) {
    let mut reader = BufReader::new(stderr);
    let mut line = String::new();
    let mut ready_tx = Some(ready_tx);

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                buffer.push(line.as_bytes());
                if let Some(pattern) = &ready_pattern {
                    if pattern.is_match(line.trim_end()) {
                        if let Some(tx) = ready_tx.take() {
                            let _ = tx.send(());
                        }
                    }
                }
            }
            Err(e) => {
                debug!("stderr read error: {e}");
                break;
            }
        }
    }
    // Dropping ready_tx here (if still Some) signals the waiter that EOF
    // arrived before the ready pattern ever matched.
}
