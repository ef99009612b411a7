//! # MCP Handler Module
//!
//! Implements the Model Context Protocol for the Ethereum query server.
//! Incoming requests are dispatched to read-only query tools that share one
//! resilient RPC client.
//!
//! ## Supported Tools
//!
//! - `validate_ethereum_address` - Format and EIP-55 checksum check, no network
//! - `estimate_gas_fee` - Base fee, priority fee and gas price in Gwei
//! - `check_wallet_balance` - Native ETH balance of an address
//! - `check_contract_owner` - Ownable getters, following EIP-1967 proxies
//! - `calculate_transaction_cost` - Typical cost of common transaction kinds
//! - `get_endpoint_health` - Order and failure counters of the RPC pool

use std::fmt::Display;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::{
    blockchain::{
        models::{AddressValidation, OperationType, ToolError},
        services::{address, balance, contract, cost, fees, health},
    },
    mcp::protocol::{error_codes, Request, Response},
    utils, AppState,
};

/// Every tool name, also accepted as a direct JSON-RPC method.
pub const TOOL_NAMES: [&str; 6] = [
    "validate_ethereum_address",
    "estimate_gas_fee",
    "check_wallet_balance",
    "check_contract_owner",
    "calculate_transaction_cost",
    "get_endpoint_health",
];

// Helper: produce a result Value that always contains a text content array
// and preserves structured data for JSON-friendly clients.
fn make_texty_result(text: String, payload: Value) -> Value {
    let content = json!([{ "type": "text", "text": text }]);
    match payload {
        Value::Object(mut map) => {
            // Do not overwrite if caller already set content
            if !map.contains_key("content") {
                map.insert("content".into(), content);
            }
            Value::Object(map)
        }
        other => json!({
            "data": other,
            "content": content
        }),
    }
}

// Turns a tool outcome into the JSON-RPC reply, logging failures once here.
fn tool_response<T, F>(req_id: &Value, tool: &str, result: Result<T, ToolError>, render: F) -> Response
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match result {
        Ok(value) => {
            let text = render(&value);
            match serde_json::to_value(&value) {
                Ok(payload) => Response::success(req_id.clone(), make_texty_result(text, payload)),
                Err(e) => Response::error(
                    req_id.clone(),
                    error_codes::INTERNAL_ERROR,
                    format!("Error in {}: failed to serialize result: {}", tool, e),
                ),
            }
        }
        Err(err) => {
            match &err {
                ToolError::InvalidInput(msg) => info!("{} rejected input: {}", tool, msg),
                other => error!("{} failed: {}", tool, other),
            }
            Response::tool_error(req_id.clone(), tool, &err)
        }
    }
}

fn describe_validation(v: &AddressValidation) -> String {
    let Some(normalized) = v.normalized_address.as_deref().filter(|_| v.valid) else {
        return format!(
            "Invalid Ethereum address: '{}' (expected 0x followed by 40 hex characters)",
            v.input
        );
    };
    let checksum = match v.checksum_valid {
        Some(true) => "valid".to_string(),
        Some(false) => format!("invalid, expected {}", normalized),
        None => "not present (single-case input)".to_string(),
    };
    let mut text = format!("Valid Ethereum address: {}\nChecksum: {}", normalized, checksum);
    if v.is_zero_address {
        text.push_str("\nWarning: this is the zero address");
    }
    text
}

// Reads the `address` argument. Non-string values are validated as their JSON
// text so they come back as an invalid address instead of a protocol error.
fn address_arg(args: &Value, req_id: &Value) -> Result<String, Response> {
    match args.get("address") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => utils::get_required_arg::<String>(args, "address", req_id),
        Some(other) => Ok(other.to_string()),
    }
}

/// This is the main dispatcher for all incoming MCP requests.
pub async fn handle_mcp_request(req: Request, state: AppState) -> Option<Response> {
    info!("Handling MCP request for method: {}", req.method);

    if req.is_notification() {
        return None;
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "tools/list" => handle_tools_list(&req),
        "tools/call" => handle_tool_call(req, state).await,
        // Convenience aliases to support direct method calls from CLI.
        // They are rewritten into tools/call internally to reuse the same logic
        method if TOOL_NAMES.contains(&method) => {
            let name = req.method.clone();
            let wrapped = Request {
                jsonrpc: req.jsonrpc.clone(),
                id: req.id.clone(),
                method: "tools/call".to_string(),
                params: Some(json!({
                    "name": name,
                    "arguments": req.params.clone().unwrap_or_else(|| json!({}))
                })),
            };
            handle_tool_call(wrapped, state).await
        }
        _ => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Some(response)
}

/// Handles a 'tools/call' request by dispatching it to the correct tool logic.
async fn handle_tool_call(req: Request, state: AppState) -> Response {
    let params = match req.params.as_ref() {
        Some(p) => p,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'params' object".into(),
            )
        }
    };

    let tool_name = match params.get("name").and_then(|n| n.as_str()) {
        Some(name) => name,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'name' field in params".into(),
            )
        }
    };

    let empty_args = json!({});
    let args = params.get("arguments").unwrap_or(&empty_args);
    let req_id = &req.id;
    let client = &state.rpc_client;
    info!("Calling tool {}", tool_name);

    let res: Result<Response, Response> = (async {
        let response = match tool_name {
            "validate_ethereum_address" => {
                let input = address_arg(args, req_id)?;
                let validation = address::validate_address(&input);
                Response::success(
                    req_id.clone(),
                    make_texty_result(describe_validation(&validation), json!(validation)),
                )
            }
            "estimate_gas_fee" => tool_response(
                req_id,
                tool_name,
                fees::estimate_gas_fee(client).await,
                fees::format_gas_estimate,
            ),
            "check_wallet_balance" => {
                let input = address_arg(args, req_id)?;
                tool_response(
                    req_id,
                    tool_name,
                    balance::get_balance(client, &input).await,
                    balance::format_balance,
                )
            }
            "check_contract_owner" => {
                let input = address_arg(args, req_id)?;
                tool_response(
                    req_id,
                    tool_name,
                    contract::check_contract_owner(client, &input).await,
                    contract::format_ownership,
                )
            }
            "calculate_transaction_cost" => {
                let transaction_type =
                    utils::get_required_arg::<String>(args, "transaction_type", req_id)?;
                tool_response(
                    req_id,
                    tool_name,
                    cost::calculate_transaction_cost(client, &transaction_type).await,
                    cost::format_cost_estimate,
                )
            }
            "get_endpoint_health" => tool_response(
                req_id,
                tool_name,
                Ok(health::endpoint_health(client.pool())),
                health::format_endpoint_health,
            ),
            unknown => unknown_tool(req_id, unknown),
        };
        Ok(response)
    })
    .await;
    res.unwrap_or_else(|err_resp| err_resp)
}

fn unknown_tool(req_id: &Value, name: impl Display) -> Response {
    Response::error(
        req_id.clone(),
        error_codes::METHOD_NOT_FOUND,
        format!("Unknown tool: {}", name),
    )
}

/// Handles the 'initialize' request.
fn handle_initialize(req: &Request) -> Response {
    let server_info = json!({
        "name": "eth_query_mcp",
        "version": env!("CARGO_PKG_VERSION")
    });
    let capabilities = json!({ "tools": { "listChanged": false } });
    let instructions = "Read-only Ethereum mainnet query server: address validation, gas fees, \
        balances, contract ownership and transaction cost estimates over a pool of public RPC endpoints.";

    Response::success(
        req.id.clone(),
        json!({
            "serverInfo": server_info,
            "protocolVersion": "2025-06-18",
            "capabilities": capabilities,
            "instructions": instructions
        }),
    )
}

/// Handles the 'tools/list' request by returning a JSON definition of all available tools.
fn handle_tools_list(req: &Request) -> Response {
    let address_schema = |description: &str| {
        json!({
            "type": "object",
            "properties": {
                "address": {"type": "string", "description": description}
            },
            "required": ["address"]
        })
    };
    let no_args = json!({ "type": "object", "properties": {}, "additionalProperties": false });
    let operation_types = OperationType::names();

    let tools = json!([
        {
            "name": "validate_ethereum_address",
            "description": "Check whether a string is a well-formed Ethereum address and whether its EIP-55 checksum is correct. Does not touch the network.",
            "inputSchema": address_schema("The 0x... address to validate.")
        },
        {
            "name": "estimate_gas_fee",
            "description": "Current Ethereum mainnet gas fees: next-block base fee, typical priority fee and gas price in Gwei.",
            "inputSchema": no_args.clone()
        },
        {
            "name": "check_wallet_balance",
            "description": "Native ETH balance of an address at the latest block, in wei and ETH.",
            "inputSchema": address_schema("The 0x... wallet address to check.")
        },
        {
            "name": "check_contract_owner",
            "description": "Find the owner of a contract via owner()/getOwner()/admin()/getAdmin(), following EIP-1967 proxies to their implementation.",
            "inputSchema": address_schema("The 0x... contract address.")
        },
        {
            "name": "calculate_transaction_cost",
            "description": "Estimate the cost of a common transaction at the current gas price. These are approximations, not guarantees.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "transaction_type": {
                        "type": "string",
                        "description": "Kind of transaction.",
                        "enum": operation_types
                    }
                },
                "required": ["transaction_type"]
            }
        },
        {
            "name": "get_endpoint_health",
            "description": "Current trial order of the RPC endpoints with their failure counters and cooldown state.",
            "inputSchema": no_args
        }
    ]);

    Response::success(req.id.clone(), json!({ "tools": tools }))
}
