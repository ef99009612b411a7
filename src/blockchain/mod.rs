// src/blockchain/mod.rs

// Resilient RPC client and the pieces it is built from
pub mod client;
pub mod endpoint_pool;
pub mod retry;
pub mod transport;
pub use client::{ResilientClient, RpcError, RpcRequest, RpcResponse};

// Query tools
pub mod models;
pub mod services;

// Re-export commonly used types
pub use ethers_core::{
    types::{Address, H256, U256},
    utils::to_checksum,
};
