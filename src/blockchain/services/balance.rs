use ethers_core::utils::to_checksum;
use tracing::info;

use crate::blockchain::{
    client::ResilientClient,
    models::{BalanceResponse, ToolError},
    services::address::parse_address,
    transport::RpcTransport,
};
use crate::utils::wei_to_eth;

/// Native ETH balance of `address` at the latest block.
pub async fn get_balance<T: RpcTransport>(
    client: &ResilientClient<T>,
    address: &str,
) -> Result<BalanceResponse, ToolError> {
    let parsed = parse_address(address)?;
    let checksummed = to_checksum(&parsed, None);
    info!("Fetching ETH balance for {}", checksummed);

    let response = client.balance(parsed).await?;
    Ok(BalanceResponse {
        address: checksummed,
        balance_wei: response.value,
        balance_eth: wei_to_eth(response.value),
        denom: "ETH".to_string(),
        source_endpoint: response.endpoint,
    })
}

pub fn format_balance(balance: &BalanceResponse) -> String {
    // Keep four decimals like a wallet would, without going through f64.
    let eth = match balance.balance_eth.split_once('.') {
        Some((whole, frac)) => format!("{}.{}", whole, &frac[..frac.len().min(4)]),
        None => balance.balance_eth.clone(),
    };
    format!("Wallet Balance: {} ETH ({} wei)", eth, balance.balance_wei)
}
