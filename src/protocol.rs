//! Protocol Driver: runs the MCP handshake and exposes `listTools`,
//! `callTool`, and raw `sendMessage` over an initialized connection.

use crate::error::{Error, Result};
use crate::transport::{MessageRouter, ProcessHandle, ProcessSupervisor, RouterError, StderrBuffer};
use crate::types::{McpRequest, McpResponse, ServerDescriptor, Tool};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

const PROTOCOL_VERSION: &str = "2024-11-05";
const CLIENT_NAME: &str = "mcp-aegis-rs";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Stopped,
    Starting,
    Initializing,
    Ready,
    Closing,
    Failed,
}

/// Drives one process through `Stopped -> ... -> Ready -> Closing -> Stopped`.
///
/// All operations are serialized from the caller's perspective; concurrent
/// reads are an implementation detail of the router used only by the
/// programmatic client methods below.
pub struct ProtocolDriver {
    state: Mutex<DriverState>,
    process: Mutex<Option<Arc<ProcessHandle>>>,
    router: Mutex<Option<Arc<MessageRouter>>>,
    stderr: Mutex<Option<StderrBuffer>>,
    next_id: AtomicUsize,
}

impl Default for ProtocolDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DriverState::Stopped),
            process: Mutex::new(None),
            router: Mutex::new(None),
            stderr: Mutex::new(None),
            next_id: AtomicUsize::new(1),
        }
    }

    pub async fn state(&self) -> DriverState {
        *self.state.lock().await
    }

    fn fresh_id(&self) -> String {
        format!("driver-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// `Stopped -> Starting -> Initializing -> Ready`.
    pub async fn connect(&self, descriptor: &ServerDescriptor) -> Result<()> {
        *self.state.lock().await = DriverState::Starting;

        let (handle, stderr_buffer) = ProcessSupervisor::start(descriptor).await.map_err(|e| {
            use crate::transport::StartupError as S;
            match e {
                S::Spawn(io) => Error::Spawn(io),
                S::Timeout(ms) => Error::StartupTimeout(ms),
                S::EarlyExit { code, signal, stderr_tail } => {
                    Error::EarlyExit { code, signal, stderr_tail }
                }
            }
        })?;

        let process = Arc::new(handle);
        let router = Arc::new(MessageRouter::spawn(process.clone()));

        *self.process.lock().await = Some(process);
        *self.router.lock().await = Some(router.clone());
        *self.stderr.lock().await = Some(stderr_buffer);
        *self.state.lock().await = DriverState::Initializing;

        match self.initialize(&router, descriptor).await {
            Ok(()) => {
                *self.state.lock().await = DriverState::Ready;
                info!("server '{}' ready", descriptor.name);
                Ok(())
            }
            Err(e) => {
                *self.state.lock().await = DriverState::Failed;
                Err(e)
            }
        }
    }

    async fn initialize(&self, router: &MessageRouter, descriptor: &ServerDescriptor) -> Result<()> {
        let id = json!(self.fresh_id());
        let init_request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "initialize",
            "params": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "clientInfo": { "name": CLIENT_NAME, "version": CLIENT_VERSION }
            }
        });

        router.send(&init_request).await.map_err(router_err)?;
        debug!("sent initialize request");

        let timeout = Duration::from_millis(descriptor.startup_timeout_ms);
        let response = router
            .read(Some(id), timeout)
            .await
            .map_err(router_err)?;

        if response.get("error").is_some() {
            return Err(Error::Handshake(format!(
                "initialize returned an error: {}",
                response["error"]
            )));
        }

        let result = response
            .get("result")
            .ok_or_else(|| Error::Handshake("initialize response missing 'result'".into()))?;

        if result.get("serverInfo").is_none() || result.get("capabilities").is_none() {
            return Err(Error::Handshake(
                "initialize result missing serverInfo/capabilities".into(),
            ));
        }

        // The very next outgoing message is the initialized notification,
        // carrying no id.
        let notification = json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        });
        router.send(&notification).await.map_err(router_err)?;
        debug!("sent notifications/initialized");

        Ok(())
    }

    async fn router(&self) -> Result<Arc<MessageRouter>> {
        self.router
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::Internal("driver not connected".into()))
    }

    /// Send an arbitrary raw JSON-RPC request and await its response.
    pub async fn send_message(
        &self,
        request: McpRequest,
        timeout: Duration,
    ) -> Result<McpResponse> {
        let router = self.router().await?;
        let id = request.id.clone();
        let payload = serde_json::to_value(&request)?;
        router.send(&payload).await.map_err(router_err)?;

        let raw = router.read(id, timeout).await.map_err(router_err)?;
        let response: McpResponse = serde_json::from_value(raw)?;
        Ok(response)
    }

    pub async fn list_tools(&self, timeout: Duration) -> Result<Vec<Tool>> {
        let request = McpRequest::new(json!(self.fresh_id()), "tools/list", Some(json!({})));
        let response = self.send_message(request, timeout).await?;

        if let Some(error) = response.error {
            return Err(Error::ToolError { code: error.code, message: error.message });
        }
        let result = response.result.unwrap_or(json!({}));
        let tools: Vec<Tool> = serde_json::from_value(
            result.get("tools").cloned().unwrap_or(json!([])),
        )?;
        Ok(tools)
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value> {
        let params = json!({ "name": name, "arguments": arguments });
        let request = McpRequest::new(json!(self.fresh_id()), "tools/call", Some(params));
        let response = self.send_message(request, timeout).await?;

        match response.error {
            Some(error) => Err(Error::ToolError { code: error.code, message: error.message }),
            None => Ok(response.result.unwrap_or(json!(null))),
        }
    }

    /// Advance the stderr cursor to the current buffer end. Returns the
    /// cursor so the caller (the Test Runner) can later ask `since`.
    pub async fn clear_stderr(&self) -> usize {
        match &*self.stderr.lock().await {
            Some(buffer) => buffer.cursor(),
            None => 0,
        }
    }

    pub async fn stderr_since(&self, cursor: usize) -> (Vec<u8>, usize) {
        match &*self.stderr.lock().await {
            Some(buffer) => buffer.since(cursor),
            None => (Vec::new(), cursor),
        }
    }

    /// Drop unclaimed frames and cancel pending reads.
    pub async fn clear_all_buffers(&self) -> Result<()> {
        let router = self.router().await?;
        router.clear().await;
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        match &*self.process.lock().await {
            Some(process) => process.is_running().await,
            None => false,
        }
    }

    /// `Ready -> Closing -> Stopped`.
    pub async fn disconnect(&self) {
        *self.state.lock().await = DriverState::Closing;
        if let Some(process) = self.process.lock().await.take() {
            process.stop().await;
        }
        *self.router.lock().await = None;
        *self.stderr.lock().await = None;
        *self.state.lock().await = DriverState::Stopped;
    }
}

fn router_err(e: RouterError) -> Error {
    match e {
        RouterError::Timeout => Error::ReadTimeout("pending".into()),
        RouterError::ServerDied => Error::ServerDied,
        RouterError::Cancelled => Error::Cancelled,
        RouterError::Io(io) => Error::Io(io),
        RouterError::Serde(e) => Error::Json(e),
    }
}
