// src/blockchain/transport.rs

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Why a single attempt against a single endpoint failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcFailure {
    #[error("request timed out")]
    Timeout,
    #[error("rate limited by endpoint")]
    RateLimited,
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("connection failed: {0}")]
    ConnectionRefused(String),
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),
    /// JSON-RPC error object that says something about the node, not the request.
    #[error("node error {code}: {message}")]
    NodeError { code: i64, message: String },
}

/// Sends one JSON-RPC envelope to one endpoint and returns the decoded JSON body.
///
/// Implementations only classify transport-level problems. Interpreting the
/// JSON-RPC envelope (`result` vs `error`) is left to the client.
pub trait RpcTransport: Send + Sync {
    fn send(
        &self,
        url: &str,
        payload: &Value,
    ) -> impl Future<Output = Result<Value, RpcFailure>> + Send;
}

/// JSON-RPC over HTTP(S) using a shared `reqwest` client.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for RPC transport")?;
        Ok(Self { client })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> RpcFailure {
    if err.is_timeout() {
        RpcFailure::Timeout
    } else if let Some(status) = err.status() {
        RpcFailure::HttpStatus(status.as_u16())
    } else {
        RpcFailure::ConnectionRefused(err.to_string())
    }
}

impl RpcTransport for HttpTransport {
    async fn send(&self, url: &str, payload: &Value) -> Result<Value, RpcFailure> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RpcFailure::RateLimited);
        }
        if !status.is_success() {
            return Err(RpcFailure::HttpStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(classify_reqwest_error)?;
        debug!("RPC response from {}: {}", url, body);
        serde_json::from_str(&body)
            .map_err(|e| RpcFailure::Malformed(format!("body is not valid JSON: {}", e)))
    }
}
