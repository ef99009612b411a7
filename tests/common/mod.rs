//! Shared helpers for integration tests. `mockito` stands in for a JSON-RPC node.

#![allow(dead_code)]

use std::time::Duration;

use eth_query_mcp::{config::Config, AppState};
use mockito::{mock, Matcher, Mock};
use serde_json::{json, Value};

/// Nothing listens on port 1, so connections are refused immediately.
pub const DEAD_ENDPOINT: &str = "http://127.0.0.1:1";

pub fn node_url(path: &str) -> String {
    format!("{}{}", mockito::server_url(), path)
}

pub fn rpc_result(result: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string()
}

/// Mock answering `method` on `path` with `result`.
pub fn mock_rpc(path: &str, method: &str, result: Value) -> Mock {
    mock("POST", path)
        .match_body(Matcher::PartialJson(json!({ "method": method })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rpc_result(result))
        .create()
}

/// Config over `urls` with `max_retries` attempts per endpoint and no backoff.
pub fn test_config(urls: &[String], max_retries: u32) -> Config {
    Config {
        rpc_urls: urls.to_vec(),
        max_retries,
        base_backoff: Duration::ZERO,
        rpc_timeout: Duration::from_secs(5),
        ..Config::default()
    }
}

pub fn test_state(urls: &[String], max_retries: u32) -> AppState {
    AppState::from_config(test_config(urls, max_retries)).unwrap()
}

/// 20 gwei
pub const GAS_PRICE_HEX: &str = "0x4a817c800";

pub fn fee_history_result() -> Value {
    json!({
        "oldestBlock": "0x1312d00",
        "baseFeePerGas": ["0x2540be400", "0x2540be400", "0x2540be400", "0x2540be400", "0x2540be400", "0x2540be400"],
        "gasUsedRatio": [0.5, 0.5, 0.5, 0.5, 0.5],
        "reward": [["0x3b9aca00"], ["0x3b9aca00"], ["0x3b9aca00"], ["0x3b9aca00"], ["0x3b9aca00"]]
    })
}
