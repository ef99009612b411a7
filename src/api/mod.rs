//! # API Module
//!
//! HTTP handlers for the Ethereum query server. Every tool available over MCP
//! also has a read-only REST route, and `/rpc` forwards raw MCP JSON-RPC.
//!
//! ## Available Endpoints
//!
//! - `GET /health` - Liveness plus a pool summary
//! - `GET /endpoints` - RPC endpoint order, failure counters and cooldowns
//! - `GET /address/:address` - Address format and checksum validation
//! - `GET /balance/:address` - Native ETH balance
//! - `GET /gas` - Current gas fees
//! - `GET /cost/:transaction_type` - Transaction cost estimate
//! - `GET /owner/:address` - Contract owner, following EIP-1967 proxies
//! - `POST /rpc` - MCP JSON-RPC forwarder

pub mod address;
pub mod balance;
pub mod contract;
pub mod fees;
pub mod health;
pub mod rpc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::{
    blockchain::{client::RpcError, models::ToolError},
    AppState,
};

/// Builds the full application router, with every route nested under `/api`.
pub fn router(state: AppState) -> Router {
    let api_router = Router::new()
        // Health and pool state
        .route("/health", get(health::health_handler))
        .route("/endpoints", get(health::endpoints_handler))
        // Query tools
        .route("/address/:address", get(address::validate_address_handler))
        .route("/balance/:address", get(balance::get_balance_handler))
        .route("/gas", get(fees::gas_fee_handler))
        .route("/cost/:transaction_type", get(fees::transaction_cost_handler))
        .route("/owner/:address", get(contract::contract_owner_handler))
        // JSON-RPC endpoint for MCP tool calls
        .route("/rpc", post(rpc::rpc_handler));

    Router::new()
        .nest("/api", api_router)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Tool failure rendered as an HTTP error: 400 for bad input, 504 when the
/// call deadline passed, 502 for any other upstream failure.
#[derive(Debug)]
pub struct ApiError(pub ToolError);

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ToolError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ToolError::Rpc(RpcError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ToolError::Rpc(_) | ToolError::ProxyResolutionFailed { .. } => StatusCode::BAD_GATEWAY,
            ToolError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let last_endpoint = match &self.0 {
            ToolError::Rpc(rpc) | ToolError::ProxyResolutionFailed { source: rpc, .. } => {
                Some(rpc.last_endpoint().to_string())
            }
            _ => None,
        };
        if status.is_server_error() {
            error!("Request failed with {}: {}", status, self.0);
        }
        let body = json!({
            "error": self.0.to_string(),
            "last_endpoint": last_endpoint,
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::transport::RpcFailure;

    #[test]
    fn maps_tool_errors_to_status_codes() {
        let bad_input = ApiError(ToolError::InvalidInput("nope".into()));
        assert_eq!(bad_input.status(), StatusCode::BAD_REQUEST);

        let timeout = ApiError(ToolError::Rpc(RpcError::Timeout {
            endpoint: "https://a.example.com".into(),
            attempts: 4,
        }));
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);

        let exhausted = ApiError(ToolError::Rpc(RpcError::AllEndpointsExhausted {
            endpoints: 1,
            attempts: 3,
            last_endpoint: "https://a.example.com".into(),
            last_failure: RpcFailure::HttpStatus(503),
        }));
        assert_eq!(exhausted.status(), StatusCode::BAD_GATEWAY);
    }
}
