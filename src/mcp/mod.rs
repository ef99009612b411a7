// MCP stdio protocol: JSON-RPC types and the tool dispatcher
pub mod handler;
pub mod protocol;
