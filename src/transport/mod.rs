//! STDIO transport: process lifecycle, stdout framing, and request/response
//! correlation. See [`crate::protocol`] for the MCP handshake state machine
//! built on top of these primitives.

pub mod process;
pub mod router;
pub mod stream;

pub use process::{ProcessHandle, ProcessSupervisor, StartupError};
pub use router::{MessageRouter, RouterError};
pub use stream::StderrBuffer;
