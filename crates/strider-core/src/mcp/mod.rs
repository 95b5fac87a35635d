//! MCP integration
//!
//! Adapter for external tool-protocol servers speaking MCP (JSON-RPC 2.0):
//! local servers as subprocesses over stdio, remote servers over a persistent
//! WebSocket stream. Discovered tools are translated into the local `Tool`
//! contract, so the dispatcher never sees the transport.

pub mod client;
pub mod config;
pub mod manager;
pub mod protocol;
pub mod tool;
pub mod transport;

pub use client::McpClient;
pub use config::{McpConfig, McpServerConfig};
pub use manager::McpManager;
pub use protocol::{McpContent, McpToolDef, McpToolResult};
pub use tool::{register_mcp_tools, McpTool};
