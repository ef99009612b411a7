// src/lib.rs

// Re-export commonly used types
pub use ethers_core::types::{Address, H160, H256, U256};

// Re-export modules
pub mod api;
pub mod blockchain;
pub mod config;
pub mod mcp;
pub mod utils;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: config::Config,
    /// Resilient client over the public RPC endpoint pool
    pub rpc_client: blockchain::client::ResilientClient,
}

impl AppState {
    pub fn from_config(config: config::Config) -> anyhow::Result<Self> {
        let rpc_client = blockchain::client::ResilientClient::from_config(&config)?;
        Ok(Self { config, rpc_client })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[test]
    fn root_types_are_ethers_core_types() {
        let address: ethers_core::types::Address =
            crate::Address::from_str("0xfcb19e6a322b27c06842a71e8c725399f049ae3a").unwrap();
        assert_eq!(
            crate::blockchain::to_checksum(&address, None),
            ethers_core::utils::to_checksum(&address, None)
        );
        let _: ethers_core::types::U256 = crate::U256::from(1u64);
    }
}
