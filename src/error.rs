//! Error types for the test harness core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to spawn process: {0}")]
    Spawn(std::io::Error),

    #[error("Server startup timed out after {0}ms")]
    StartupTimeout(u64),

    #[error("Server exited during startup (code={code:?}, signal={signal:?}): {stderr_tail}")]
    EarlyExit {
        code: Option<i32>,
        signal: Option<i32>,
        stderr_tail: String,
    },

    #[error("MCP handshake failed: {0}")]
    Handshake(String),

    #[error("Timed out waiting for a response to request {0}")]
    ReadTimeout(String),

    #[error("Server process exited unexpectedly")]
    ServerDied,

    #[error("Pending read cancelled")]
    Cancelled,

    #[error("Malformed pattern at {path}: {reason}")]
    Pattern { path: String, reason: String },

    #[error("Server returned a JSON-RPC error: {code} {message}")]
    ToolError { code: i32, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors that should abort the remainder of a suite rather
    /// than merely failing the current test.
    pub fn is_suite_fatal(&self) -> bool {
        matches!(
            self,
            Error::ServerDied
                | Error::Pattern { .. }
                | Error::StartupTimeout(_)
                | Error::EarlyExit { .. }
                | Error::Handshake(_)
        )
    }
}
