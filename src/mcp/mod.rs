//! MCP wire layer: framing, subprocess transport, and session lifecycle.

pub mod framer;
pub mod protocol;
pub mod session;
pub mod transport;

pub use protocol::{Frame, JsonRpcError, JsonRpcResponse, RequestId};
pub use session::{McpSession, PROTOCOL_VERSION};
pub use transport::{StderrBuffer, StdioTransport};
