//! Common data types shared across the transport, protocol, and runner layers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// MCP JSON-RPC request or notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl McpRequest {
    pub fn new(id: impl Into<serde_json::Value>, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.into(),
            params,
        }
    }
}

/// MCP JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

/// MCP JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A tool entry as returned by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<serde_json::Value>,
}

/// Launch descriptor for the MCP server under test.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerDescriptor {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_startup_timeout_ms", rename = "startupTimeout")]
    pub startup_timeout_ms: u64,
    #[serde(default, rename = "readyPattern")]
    pub ready_pattern: Option<String>,
}

fn default_startup_timeout_ms() -> u64 {
    5000
}

/// A declarative test suite: a description plus an ordered list of cases.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Suite {
    pub description: String,
    pub tests: Vec<TestCase>,
}

/// A single request/response/stderr expectation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestCase {
    pub it: String,
    pub request: McpRequest,
    #[serde(default)]
    pub expect: Expectation,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Expectation {
    #[serde(default)]
    pub response: Option<serde_json::Value>,
    #[serde(default)]
    pub stderr: Option<StderrExpectation>,
}

/// `expect.stderr` is either the literal `toBeEmpty`, a plain equality string,
/// or a `match:` pattern — all three collapse to a plain YAML string on the
/// wire, so this is parsed from a bare `String` and classified at evaluation
/// time rather than via a tagged enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StderrExpectation(pub String);

impl StderrExpectation {
    pub fn is_empty_token(&self) -> bool {
        self.0 == "toBeEmpty"
    }

    pub fn is_pattern(&self) -> bool {
        self.0.starts_with("match:")
    }
}
