//! `tm-mcp` — the MCP host for tableau-mcp.
//!
//! This crate provides:
//! - JSON-RPC 2.0 protocol types and the mapping of tool content onto MCP
//!   content items.
//! - [`McpServer`], which answers `initialize`, `tools/*`, `resources/*`,
//!   `prompts/list` and `ping`.
//! - A newline-delimited stdio transport.
//!
//! # Usage
//!
//! ```rust,ignore
//! let server = McpServer::new(dispatcher, resources);
//! tm_mcp::serve_stdio(&server).await?;
//! ```

pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
pub use server::McpServer;
pub use transport::{serve, serve_stdio, MAX_LINE_BYTES};
