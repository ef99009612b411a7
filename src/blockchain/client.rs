//! Resilient JSON-RPC client over a pool of public Ethereum endpoints.
//!
//! Every logical call snapshots the pool order, then walks it endpoint by
//! endpoint. Each endpoint gets `max_attempts` tries with exponential backoff
//! between them; when its budget is spent the client moves to the next one.
//! The call only fails once every endpoint has been exhausted, or when the
//! call deadline passes first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use ethers_core::types::{Address, Bytes, H256, U256};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::blockchain::{
    endpoint_pool::{EndpointPool, Outcome},
    models::{BlockHeader, FeeHistory},
    retry::{NextStep, RetryPolicy, RetryState},
    transport::{HttpTransport, RpcFailure, RpcTransport},
};
use crate::config::Config;

/// Errors surfaced to callers of the resilient client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error(
        "all {endpoints} RPC endpoints exhausted after {attempts} attempts; last endpoint {last_endpoint} failed: {last_failure}"
    )]
    AllEndpointsExhausted {
        endpoints: usize,
        attempts: u32,
        last_endpoint: String,
        last_failure: RpcFailure,
    },
    #[error("invalid response shape after {attempts} attempts; last endpoint {endpoint}: {reason}")]
    InvalidResponseShape {
        endpoint: String,
        reason: String,
        attempts: u32,
    },
    #[error("RPC call timed out after {attempts} attempts; last endpoint {endpoint}")]
    Timeout { endpoint: String, attempts: u32 },
    #[error("{endpoint} rejected {method} (code {code}): {message}")]
    Rejected {
        endpoint: String,
        method: String,
        code: i64,
        message: String,
    },
}

impl RpcError {
    pub fn last_endpoint(&self) -> &str {
        match self {
            RpcError::AllEndpointsExhausted { last_endpoint, .. } => last_endpoint,
            RpcError::InvalidResponseShape { endpoint, .. }
            | RpcError::Timeout { endpoint, .. }
            | RpcError::Rejected { endpoint, .. } => endpoint,
        }
    }
}

/// One JSON-RPC method invocation. The expected result shape is the type the
/// caller decodes into.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub method: String,
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    fn to_payload(&self, id: u64) -> Value {
        json!({
            "jsonrpc": "2.0",
            "method": self.method,
            "params": self.params,
            "id": id,
        })
    }
}

/// A decoded result together with the endpoint that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse<R> {
    pub value: R,
    pub endpoint: String,
}

enum AttemptError {
    Failure(RpcFailure),
    Rejected { code: i64, message: String },
}

const RATE_LIMIT_CODES: [i64; 3] = [429, -32005, -32029];

/// Geth and most clients use code 3 for reverts; some only say so in the message.
const EXECUTION_ERROR_CODE: i64 = 3;

fn is_rate_limit(code: i64, message: &str) -> bool {
    let message = message.to_lowercase();
    RATE_LIMIT_CODES.contains(&code)
        || message.contains("rate limit")
        || message.contains("too many requests")
}

// An execution error is the chain's answer to the request, the same on every node.
fn is_execution_error(code: i64, message: &str) -> bool {
    code == EXECUTION_ERROR_CODE || message.to_lowercase().contains("revert")
}

// Validates the envelope and decodes `result` into the expected shape.
fn interpret<R: DeserializeOwned>(envelope: Value) -> Result<R, AttemptError> {
    let Value::Object(mut body) = envelope else {
        return Err(AttemptError::Failure(RpcFailure::Malformed(
            "response is not a JSON object".into(),
        )));
    };

    if let Some(error) = body.remove("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if is_rate_limit(code, &message) {
            return Err(AttemptError::Failure(RpcFailure::RateLimited));
        }
        if is_execution_error(code, &message) {
            return Err(AttemptError::Rejected { code, message });
        }
        return Err(AttemptError::Failure(RpcFailure::NodeError { code, message }));
    }

    let result = body.remove("result").ok_or_else(|| {
        AttemptError::Failure(RpcFailure::Malformed("missing 'result' field".into()))
    })?;
    serde_json::from_value(result).map_err(|e| {
        AttemptError::Failure(RpcFailure::Malformed(format!("unexpected result shape: {}", e)))
    })
}

/// Client for read-only Ethereum queries over a pool of endpoints.
pub struct ResilientClient<T = HttpTransport> {
    pool: Arc<EndpointPool>,
    transport: Arc<T>,
    policy: RetryPolicy,
    request_ids: Arc<AtomicU64>,
}

impl<T> Clone for ResilientClient<T> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            transport: Arc::clone(&self.transport),
            policy: self.policy.clone(),
            request_ids: Arc::clone(&self.request_ids),
        }
    }
}

impl ResilientClient<HttpTransport> {
    /// Builds the HTTP client, pool and default policy from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let pool = EndpointPool::new(&config.rpc_urls, config.demotion_threshold, config.cooldown)?;
        let transport = HttpTransport::new(config.rpc_timeout)?;
        Ok(Self::new(Arc::new(pool), transport, config.retry_policy()))
    }
}

impl<T: RpcTransport> ResilientClient<T> {
    pub fn new(pool: Arc<EndpointPool>, transport: T, policy: RetryPolicy) -> Self {
        Self {
            pool,
            transport: Arc::new(transport),
            policy,
            request_ids: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn pool(&self) -> &Arc<EndpointPool> {
        &self.pool
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Issues `request` with the client's default retry policy.
    pub async fn call<R: DeserializeOwned>(
        &self,
        request: &RpcRequest,
    ) -> Result<RpcResponse<R>, RpcError> {
        self.call_with(request, &self.policy).await
    }

    /// Issues `request` with an explicit retry policy.
    pub async fn call_with<R: DeserializeOwned>(
        &self,
        request: &RpcRequest,
        policy: &RetryPolicy,
    ) -> Result<RpcResponse<R>, RpcError> {
        let candidates = self.pool.next_candidates();
        let started = Instant::now();
        let deadline = started + policy.call_deadline;
        let mut state = RetryState::new(candidates.len(), policy);
        let mut every_failure_malformed = true;
        let mut last_tried: Option<String> = None;

        loop {
            let Some(endpoint) = candidates.get(state.endpoint_index()) else {
                // Only reachable with an empty candidate list.
                return Err(RpcError::AllEndpointsExhausted {
                    endpoints: 0,
                    attempts: state.total_attempts(),
                    last_endpoint: "<none>".into(),
                    last_failure: RpcFailure::ConnectionRefused("endpoint pool is empty".into()),
                });
            };

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "{} gave up after {:?}: call deadline reached on {}",
                    request.method,
                    now - started,
                    endpoint.url
                );
                return Err(RpcError::Timeout {
                    endpoint: last_tried.unwrap_or_else(|| endpoint.url.clone()),
                    attempts: state.total_attempts(),
                });
            }

            state.begin_attempt();
            let payload = request.to_payload(self.request_ids.fetch_add(1, Ordering::Relaxed));
            let budget = policy.attempt_timeout.min(deadline - now);
            debug!(
                "{} attempt {} on {} (budget {:?})",
                request.method,
                state.attempt() + 1,
                endpoint.url,
                budget
            );

            let outcome = match timeout(budget, self.transport.send(&endpoint.url, &payload)).await
            {
                Ok(Ok(envelope)) => interpret::<R>(envelope),
                Ok(Err(failure)) => Err(AttemptError::Failure(failure)),
                Err(_) => Err(AttemptError::Failure(RpcFailure::Timeout)),
            };

            let failure = match outcome {
                Ok(value) => {
                    self.pool.record_outcome(&endpoint.url, Outcome::Success);
                    return Ok(RpcResponse {
                        value,
                        endpoint: endpoint.url.clone(),
                    });
                }
                Err(AttemptError::Rejected { code, message }) => {
                    // The node answered; the request itself is what failed.
                    self.pool.record_outcome(&endpoint.url, Outcome::Success);
                    return Err(RpcError::Rejected {
                        endpoint: endpoint.url.clone(),
                        method: request.method.clone(),
                        code,
                        message,
                    });
                }
                Err(AttemptError::Failure(failure)) => failure,
            };

            warn!(
                "{} attempt {} on {} failed: {}",
                request.method,
                state.attempt() + 1,
                endpoint.url,
                failure
            );
            self.pool.record_outcome(&endpoint.url, Outcome::Failure);
            every_failure_malformed &= matches!(failure, RpcFailure::Malformed(_));
            last_tried = Some(endpoint.url.clone());

            let mut step = state.on_failure(policy);
            if let NextStep::Retry { delay } = step {
                if Instant::now() + delay >= deadline {
                    // No time left to back off here, but advancing costs nothing.
                    debug!(
                        "{} backoff of {:?} on {} would pass the deadline",
                        request.method, delay, endpoint.url
                    );
                    step = state.skip_endpoint();
                    if step == NextStep::Exhausted {
                        return Err(RpcError::Timeout {
                            endpoint: endpoint.url.clone(),
                            attempts: state.total_attempts(),
                        });
                    }
                }
            }

            match step {
                NextStep::Retry { delay } => sleep(delay).await,
                NextStep::Advance => {
                    debug!("{} moving on from {}", request.method, endpoint.url);
                }
                NextStep::Exhausted => {
                    let attempts = state.total_attempts();
                    return Err(match failure {
                        RpcFailure::Malformed(reason) if every_failure_malformed => {
                            RpcError::InvalidResponseShape {
                                endpoint: endpoint.url.clone(),
                                reason,
                                attempts,
                            }
                        }
                        last_failure => RpcError::AllEndpointsExhausted {
                            endpoints: candidates.len(),
                            attempts,
                            last_endpoint: endpoint.url.clone(),
                            last_failure,
                        },
                    });
                }
            }
        }
    }

    /// `eth_gasPrice`, in wei.
    pub async fn gas_price(&self) -> Result<RpcResponse<U256>, RpcError> {
        self.call(&RpcRequest::new("eth_gasPrice", vec![])).await
    }

    /// `eth_feeHistory` over the last `block_count` blocks.
    pub async fn fee_history(
        &self,
        block_count: u64,
        reward_percentiles: &[f64],
    ) -> Result<RpcResponse<FeeHistory>, RpcError> {
        let request = RpcRequest::new(
            "eth_feeHistory",
            vec![json!(U256::from(block_count)), json!("latest"), json!(reward_percentiles)],
        );
        self.call(&request).await
    }

    /// Header fields of the latest block.
    pub async fn latest_block(&self) -> Result<RpcResponse<BlockHeader>, RpcError> {
        self.call(&RpcRequest::new("eth_getBlockByNumber", vec![json!("latest"), json!(false)]))
            .await
    }

    /// `eth_getBalance` at the latest block, in wei.
    pub async fn balance(&self, address: Address) -> Result<RpcResponse<U256>, RpcError> {
        self.call(&RpcRequest::new("eth_getBalance", vec![json!(address), json!("latest")]))
            .await
    }

    /// `eth_getStorageAt` at the latest block.
    pub async fn storage_at(&self, address: Address, slot: H256) -> Result<RpcResponse<H256>, RpcError> {
        let request = RpcRequest::new(
            "eth_getStorageAt",
            vec![json!(address), json!(slot), json!("latest")],
        );
        self.call(&request).await
    }

    /// Read-only `eth_call` at the latest block.
    pub async fn eth_call(&self, to: Address, data: Bytes) -> Result<RpcResponse<Bytes>, RpcError> {
        let request = RpcRequest::new(
            "eth_call",
            vec![json!({ "to": to, "data": data }), json!("latest")],
        );
        self.call(&request).await
    }
}
