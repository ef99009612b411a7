// src/mcp/protocol.rs

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::blockchain::models::ToolError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

fn default_jsonrpc() -> String {
    "2.0".to_string()
}

impl Request {
    pub fn is_notification(&self) -> bool {
        self.id.is_null()
    }
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(ErrorObject {
                code,
                message,
                data: None,
            }),
        }
    }

    pub fn error_with_data(id: Value, code: i32, message: String, data: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(ErrorObject {
                code,
                message,
                data: Some(data),
            }),
        }
    }

    /// Maps a tool failure onto a JSON-RPC error. Bad input is the caller's
    /// fault (`INVALID_PARAMS`); anything network-side is `INTERNAL_ERROR` and
    /// names the last endpoint tried.
    pub fn tool_error(id: Value, tool: &str, err: &ToolError) -> Self {
        let message = format!("Error in {}: {}", tool, err);
        match err {
            ToolError::InvalidInput(_) => Self::error(id, error_codes::INVALID_PARAMS, message),
            ToolError::Rpc(rpc) | ToolError::ProxyResolutionFailed { source: rpc, .. } => {
                Self::error_with_data(
                    id,
                    error_codes::INTERNAL_ERROR,
                    message,
                    json!({ "last_endpoint": rpc.last_endpoint() }),
                )
            }
            ToolError::Internal(_) => Self::error(id, error_codes::INTERNAL_ERROR, message),
        }
    }
}

// Standard JSON-RPC error codes
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}
