// src/blockchain/models.rs
use std::fmt;
use std::str::FromStr;

use ethers_core::types::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blockchain::client::RpcError;
use crate::utils::serde_decimal;

// --- Error types for query tools ---

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("proxy resolution failed for {address}: {source}")]
    ProxyResolutionFailed {
        address: String,
        #[source]
        source: RpcError,
    },
    #[error("internal error: {0}")]
    Internal(String),
}

// --- RPC result shapes ---

/// Result of `eth_feeHistory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeHistory {
    pub oldest_block: U256,
    /// One entry per block in the range plus one for the next block.
    pub base_fee_per_gas: Vec<U256>,
    #[serde(default)]
    pub gas_used_ratio: Vec<f64>,
    /// Priority fees per block at the requested percentiles.
    #[serde(default)]
    pub reward: Vec<Vec<U256>>,
}

/// The part of `eth_getBlockByNumber` the fee estimator reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub number: Option<U256>,
    /// Absent before London.
    #[serde(default)]
    pub base_fee_per_gas: Option<U256>,
}

// --- Address Models ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressValidation {
    pub input: String,
    pub valid: bool,
    /// `None` when the input is single-case and therefore carries no checksum.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_address: Option<String>,
    pub is_zero_address: bool,
}

// --- Balance Models ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceResponse {
    pub address: String,
    #[serde(with = "serde_decimal")]
    pub balance_wei: U256,
    pub balance_eth: String,
    pub denom: String,
    pub source_endpoint: String,
}

// --- Fee Models ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GasEstimate {
    #[serde(with = "serde_decimal")]
    pub base_fee_wei: U256,
    #[serde(with = "serde_decimal")]
    pub priority_fee_wei: U256,
    #[serde(with = "serde_decimal")]
    pub gas_price_wei: U256,
    pub base_fee_gwei: f64,
    pub priority_fee_gwei: f64,
    pub gas_price_gwei: f64,
    /// Cost of a plain 21 000-gas ETH transfer at `gas_price_wei`.
    pub basic_transfer_cost_gwei: f64,
    /// Where the base fee came from; `priority_fee_*` is zero unless this is fee history.
    pub fee_source: FeeSource,
    pub source_endpoint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeSource {
    FeeHistory,
    LatestBlock,
}

/// Kinds of transaction with a known, typical gas cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    BasicTransfer,
    Erc20Transfer,
    NftTransfer,
    UniswapSwap,
    ContractDeploy,
}

impl OperationType {
    pub const ALL: [OperationType; 5] = [
        OperationType::BasicTransfer,
        OperationType::Erc20Transfer,
        OperationType::NftTransfer,
        OperationType::UniswapSwap,
        OperationType::ContractDeploy,
    ];

    /// Typical gas units for this operation. These are rules of thumb, not
    /// measurements; real usage depends on the contract and calldata.
    pub fn gas_units(self) -> u64 {
        match self {
            OperationType::BasicTransfer => 21_000,
            OperationType::Erc20Transfer => 65_000,
            OperationType::NftTransfer => 100_000,
            OperationType::UniswapSwap => 180_000,
            OperationType::ContractDeploy => 2_000_000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::BasicTransfer => "basic_transfer",
            OperationType::Erc20Transfer => "erc20_transfer",
            OperationType::NftTransfer => "nft_transfer",
            OperationType::UniswapSwap => "uniswap_swap",
            OperationType::ContractDeploy => "contract_deploy",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|op| op.as_str()).collect()
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        while normalized.contains("__") {
            normalized = normalized.replace("__", "_");
        }

        match normalized.as_str() {
            "basic_transfer" | "eth_transfer" | "transfer" => Ok(OperationType::BasicTransfer),
            "erc20_transfer" | "erc_20_transfer" | "token_transfer" => {
                Ok(OperationType::Erc20Transfer)
            }
            "nft_transfer" | "erc721_transfer" => Ok(OperationType::NftTransfer),
            "uniswap_swap" | "dex_swap" | "swap" => Ok(OperationType::UniswapSwap),
            "contract_deploy" | "contract_deployment" | "deploy" => {
                Ok(OperationType::ContractDeploy)
            }
            _ => Err(ToolError::InvalidInput(format!(
                "Invalid transaction type '{}'. Must be one of: {}",
                s,
                Self::names().join(", ")
            ))),
        }
    }
}

pub const COST_ESTIMATE_NOTE: &str =
    "These are estimates and may vary based on network conditions; they are not guarantees.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEstimate {
    pub operation_type: OperationType,
    pub estimated_gas_units: u64,
    #[serde(with = "serde_decimal")]
    pub gas_price_wei: U256,
    pub gas_price_gwei: f64,
    #[serde(with = "serde_decimal")]
    pub total_cost_wei: U256,
    pub total_cost_gwei: f64,
    /// Total cost in ETH, as an exact decimal string.
    pub total_cost_native_unit: String,
    pub note: &'static str,
}

// --- Contract Models ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProxyPattern {
    #[serde(rename = "EIP1967")]
    Eip1967,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyInfo {
    pub is_proxy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation_address: Option<String>,
    pub pattern_matched: ProxyPattern,
}

impl ProxyInfo {
    pub fn not_a_proxy() -> Self {
        Self {
            is_proxy: false,
            implementation_address: None,
            pattern_matched: ProxyPattern::None,
        }
    }

    pub fn eip1967(implementation: Address) -> Self {
        Self {
            is_proxy: true,
            implementation_address: Some(ethers_core::utils::to_checksum(&implementation, None)),
            pattern_matched: ProxyPattern::Eip1967,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipInfo {
    pub contract_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_address: Option<String>,
    /// Getter that produced the owner, e.g. `owner()`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_source: Option<String>,
    /// Whether the owner was read from the implementation rather than the contract itself.
    pub owner_from_implementation: bool,
    pub is_proxy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation_address: Option<String>,
}
