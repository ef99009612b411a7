//! Failover and retry behaviour of the resilient client against real HTTP.

mod common;

use common::*;
use eth_query_mcp::blockchain::{
    client::{ResilientClient, RpcError, RpcRequest},
    transport::RpcFailure,
};
use mockito::mock;
use serde_json::json;

fn client(urls: &[String], max_retries: u32) -> ResilientClient {
    ResilientClient::from_config(&test_config(urls, max_retries)).unwrap()
}

#[tokio::test]
async fn fails_over_from_dead_endpoint() {
    let healthy = node_url("/failover-healthy");
    let _node = mock_rpc("/failover-healthy", "eth_gasPrice", json!(GAS_PRICE_HEX));

    let client = client(&[DEAD_ENDPOINT.to_string(), healthy.clone()], 2);
    let response = client.gas_price().await.unwrap();

    assert_eq!(response.value.as_u64(), 20_000_000_000);
    assert_eq!(response.endpoint, healthy);

    let snapshot = client.pool().snapshot();
    let dead = snapshot.iter().find(|e| e.url == DEAD_ENDPOINT).unwrap();
    assert_eq!(dead.consecutive_failures, 2);
}

#[tokio::test]
async fn rate_limited_endpoint_is_retried_then_skipped() {
    let limited = mock("POST", "/limited")
        .with_status(429)
        .with_body("Too Many Requests")
        .expect(3)
        .create();
    let _healthy = mock_rpc("/limited-fallback", "eth_gasPrice", json!(GAS_PRICE_HEX));

    let client = client(&[node_url("/limited"), node_url("/limited-fallback")], 3);
    let response = client.gas_price().await.unwrap();

    assert_eq!(response.endpoint, node_url("/limited-fallback"));
    limited.assert();
}

#[tokio::test]
async fn exhausts_every_endpoint_exactly() {
    let first = mock("POST", "/exhaust-a").with_status(503).expect(2).create();
    let second = mock("POST", "/exhaust-b").with_status(502).expect(2).create();

    let client = client(&[node_url("/exhaust-a"), node_url("/exhaust-b")], 2);
    let err = client.gas_price().await.unwrap_err();

    assert_eq!(
        err,
        RpcError::AllEndpointsExhausted {
            endpoints: 2,
            attempts: 4,
            last_endpoint: node_url("/exhaust-b"),
            last_failure: RpcFailure::HttpStatus(502),
        }
    );
    first.assert();
    second.assert();
}

#[tokio::test]
async fn missing_result_everywhere_is_invalid_shape() {
    let _node = mock("POST", "/no-result")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","id":1}"#)
        .create();

    let client = client(&[node_url("/no-result")], 2);
    let err = client
        .call::<String>(&RpcRequest::new("eth_gasPrice", vec![]))
        .await
        .unwrap_err();

    match err {
        RpcError::InvalidResponseShape { endpoint, attempts, .. } => {
            assert_eq!(endpoint, node_url("/no-result"));
            assert_eq!(attempts, 2);
        }
        other => panic!("expected InvalidResponseShape, got {:?}", other),
    }
}

#[tokio::test]
async fn execution_revert_is_not_retried() {
    let node = mock("POST", "/reverts")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":3,"message":"execution reverted"}}"#)
        .expect(1)
        .create();

    let client = client(&[node_url("/reverts"), DEAD_ENDPOINT.to_string()], 3);
    let err = client
        .call::<String>(&RpcRequest::new("eth_call", vec![json!({"to": "0x0"}), json!("latest")]))
        .await
        .unwrap_err();

    assert!(matches!(err, RpcError::Rejected { code: 3, .. }));
    node.assert();
    // A revert says nothing about endpoint health.
    assert_eq!(client.pool().snapshot()[0].consecutive_failures, 0);
}

#[tokio::test]
async fn internal_node_error_fails_over() {
    let broken = mock("POST", "/internal-error")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32603,"message":"Internal error"}}"#)
        .expect(2)
        .create();
    let _healthy = mock_rpc("/internal-error-fallback", "eth_gasPrice", json!(GAS_PRICE_HEX));

    let client = client(&[node_url("/internal-error"), node_url("/internal-error-fallback")], 2);
    let response = client.gas_price().await.unwrap();

    assert_eq!(response.endpoint, node_url("/internal-error-fallback"));
    broken.assert();
    assert_eq!(client.pool().snapshot()[0].consecutive_failures, 2);
}

#[tokio::test]
async fn node_errors_everywhere_name_the_last_failure() {
    let _node = mock("POST", "/header-missing")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"header not found"}}"#)
        .create();

    let client = client(&[node_url("/header-missing")], 1);
    let err = client.gas_price().await.unwrap_err();

    assert!(matches!(
        err,
        RpcError::AllEndpointsExhausted { last_failure: RpcFailure::NodeError { code: -32000, .. }, .. }
    ));
}

#[tokio::test]
async fn repeated_failures_demote_endpoint_for_later_calls() {
    let _flaky = mock("POST", "/demote-flaky").with_status(500).create();
    let _healthy = mock_rpc("/demote-healthy", "eth_gasPrice", json!(GAS_PRICE_HEX));

    // Three attempts on the flaky endpoint reach the default demotion threshold.
    let client = client(&[node_url("/demote-flaky"), node_url("/demote-healthy")], 3);
    client.gas_price().await.unwrap();

    let order: Vec<String> = client.pool().snapshot().into_iter().map(|e| e.url).collect();
    assert_eq!(order, vec![node_url("/demote-healthy"), node_url("/demote-flaky")]);

    // The next call goes straight to the healthy endpoint.
    let response = client.gas_price().await.unwrap();
    assert_eq!(response.endpoint, node_url("/demote-healthy"));
    let flaky = client
        .pool()
        .snapshot()
        .into_iter()
        .find(|e| e.url == node_url("/demote-flaky"))
        .unwrap();
    assert!(flaky.cooling_down);
    assert_eq!(flaky.consecutive_failures, 3);
}
