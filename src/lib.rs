//! mcp-aegis-rs
//!
//! A declarative test harness for MCP servers speaking JSON-RPC over
//! stdio. Spawns a server process, drives the MCP handshake, and runs
//! suites of request/response/stderr expectations against it.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod pattern;
pub mod protocol;
pub mod runner;
pub mod transport;
pub mod types;

pub use error::{Error, Result};
pub use protocol::ProtocolDriver;
pub use runner::TestRunner;
