use ethers_core::types::U256;
use tracing::{info, warn};

use crate::blockchain::{
    client::ResilientClient,
    models::{FeeHistory, FeeSource, GasEstimate, OperationType, ToolError},
    transport::RpcTransport,
};
use crate::utils::wei_to_gwei;

/// Blocks of fee history sampled for the priority fee.
pub const FEE_HISTORY_BLOCKS: u64 = 5;
/// Reward percentile sampled from each block.
pub const PRIORITY_FEE_PERCENTILE: f64 = 50.0;

/// Current fee market snapshot: gas price, next-block base fee and a typical
/// priority fee.
///
/// Nodes without `eth_feeHistory` still get an estimate. The base fee then
/// comes from the latest block header and the priority fee is reported as zero
/// with `fee_source` set to [`FeeSource::LatestBlock`].
pub async fn estimate_gas_fee<T: RpcTransport>(
    client: &ResilientClient<T>,
) -> Result<GasEstimate, ToolError> {
    info!("Estimating gas fees from {} pooled endpoints", client.pool().len());

    let (gas_price, history) = tokio::join!(
        client.gas_price(),
        client.fee_history(FEE_HISTORY_BLOCKS, &[PRIORITY_FEE_PERCENTILE]),
    );
    let gas_price = gas_price?;

    let (base_fee_wei, priority_fee_wei, fee_source) = match history {
        Ok(history) => {
            let (base, priority) = fees_from_history(&history.value);
            (base, priority, FeeSource::FeeHistory)
        }
        Err(e) => {
            warn!("eth_feeHistory unavailable ({}), using the latest block's base fee", e);
            let block = client.latest_block().await?;
            (block.value.base_fee_per_gas.unwrap_or_default(), U256::zero(), FeeSource::LatestBlock)
        }
    };

    let gas_price_wei = gas_price.value;
    let gas_price_gwei = wei_to_gwei(gas_price_wei)?;
    let basic_transfer_cost_gwei =
        wei_to_gwei(gas_price_wei.saturating_mul(U256::from(OperationType::BasicTransfer.gas_units())))?;

    Ok(GasEstimate {
        base_fee_wei,
        priority_fee_wei,
        gas_price_wei,
        base_fee_gwei: wei_to_gwei(base_fee_wei)?,
        priority_fee_gwei: wei_to_gwei(priority_fee_wei)?,
        gas_price_gwei,
        basic_transfer_cost_gwei,
        fee_source,
        source_endpoint: gas_price.endpoint,
    })
}

/// Next-block base fee and the mean sampled reward.
fn fees_from_history(history: &FeeHistory) -> (U256, U256) {
    // The last entry is the base fee of the block after the newest one sampled.
    let base_fee_wei = history.base_fee_per_gas.last().copied().unwrap_or_default();

    let rewards: Vec<U256> = history
        .reward
        .iter()
        .filter_map(|block| block.first().copied())
        .collect();
    let priority_fee_wei = if rewards.is_empty() {
        U256::zero()
    } else {
        rewards.iter().fold(U256::zero(), |acc, r| acc.saturating_add(*r)) / U256::from(rewards.len())
    };
    (base_fee_wei, priority_fee_wei)
}

/// Current `eth_gasPrice` in wei, for callers that only need the price.
pub async fn current_gas_price<T: RpcTransport>(
    client: &ResilientClient<T>,
) -> Result<U256, ToolError> {
    Ok(client.gas_price().await?.value)
}

pub fn format_gas_estimate(estimate: &GasEstimate) -> String {
    let priority = match estimate.fee_source {
        FeeSource::FeeHistory => format!("{:.2} Gwei", estimate.priority_fee_gwei),
        FeeSource::LatestBlock => "unavailable (no eth_feeHistory)".to_string(),
    };
    format!(
        "Current Ethereum Gas Fees:\n\
         Base Fee: {:.2} Gwei\n\
         Priority Fee: {}\n\
         Gas Price: {:.2} Gwei\n\
         Estimated Cost for Basic Transfer: {:.0} Gwei\n\
         Source: {}\n\
         Note: These are estimates and may vary based on network conditions",
        estimate.base_fee_gwei,
        priority,
        estimate.gas_price_gwei,
        estimate.basic_transfer_cost_gwei,
        estimate.source_endpoint,
    )
}
