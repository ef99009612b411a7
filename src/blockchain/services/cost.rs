use ethers_core::types::U256;
use tracing::info;

use crate::blockchain::{
    client::ResilientClient,
    models::{CostEstimate, OperationType, ToolError, COST_ESTIMATE_NOTE},
    services::fees::current_gas_price,
    transport::RpcTransport,
};
use crate::utils::{wei_to_eth, wei_to_gwei};

/// Cost of `operation` at `gas_price_wei`, using the static gas-unit table.
pub fn estimate(operation: OperationType, gas_price_wei: U256) -> Result<CostEstimate, ToolError> {
    let units = operation.gas_units();
    let total_cost_wei = gas_price_wei
        .checked_mul(U256::from(units))
        .ok_or_else(|| ToolError::Internal("transaction cost overflows 256 bits".into()))?;

    Ok(CostEstimate {
        operation_type: operation,
        estimated_gas_units: units,
        gas_price_wei,
        gas_price_gwei: wei_to_gwei(gas_price_wei)?,
        total_cost_wei,
        total_cost_gwei: wei_to_gwei(total_cost_wei)?,
        total_cost_native_unit: wei_to_eth(total_cost_wei),
        note: COST_ESTIMATE_NOTE,
    })
}

/// Parses `transaction_type`, fetches the current gas price and estimates.
pub async fn calculate_transaction_cost<T: RpcTransport>(
    client: &ResilientClient<T>,
    transaction_type: &str,
) -> Result<CostEstimate, ToolError> {
    let operation: OperationType = transaction_type.parse()?;
    info!("Calculating transaction cost for {}", operation);
    let gas_price = current_gas_price(client).await?;
    estimate(operation, gas_price)
}

pub fn format_cost_estimate(cost: &CostEstimate) -> String {
    format!(
        "Transaction Type: {}\n\
         Gas Limit: {} units\n\
         Gas Price: {:.2} Gwei\n\
         Estimated Cost: {:.0} Gwei ({} ETH)\n\
         Note: {}",
        cost.operation_type,
        cost.estimated_gas_units,
        cost.gas_price_gwei,
        cost.total_cost_gwei,
        cost.total_cost_native_unit,
        cost.note,
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::blockchain::client::test_support::*;

    const TWENTY_GWEI: u64 = 20_000_000_000;

    #[test]
    fn erc20_transfer_at_twenty_gwei() {
        let op: OperationType = "ERC20 transfer".parse().unwrap();
        let cost = estimate(op, U256::from(TWENTY_GWEI)).unwrap();

        assert_eq!(cost.operation_type, OperationType::Erc20Transfer);
        assert_eq!(cost.estimated_gas_units, 65_000);
        assert_eq!(cost.total_cost_wei, U256::from(65_000u64 * TWENTY_GWEI));
        assert_eq!(cost.total_cost_gwei, 1_300_000.0);
        assert_eq!(cost.total_cost_native_unit, "0.001300000000000000");
        assert!(cost.note.contains("not guarantees"));
    }

    #[test]
    fn every_operation_scales_with_gas_price() {
        for op in OperationType::ALL {
            let cost = estimate(op, U256::from(TWENTY_GWEI)).unwrap();
            assert_eq!(cost.total_cost_wei, U256::from(op.gas_units()) * U256::from(TWENTY_GWEI));
        }
    }

    #[test]
    fn operation_names_are_forgiving() {
        assert_eq!("basic_transfer".parse::<OperationType>().unwrap(), OperationType::BasicTransfer);
        assert_eq!("Uniswap-Swap".parse::<OperationType>().unwrap(), OperationType::UniswapSwap);
        assert_eq!("DEX swap".parse::<OperationType>().unwrap(), OperationType::UniswapSwap);
        assert_eq!(" contract  deploy ".parse::<OperationType>().unwrap(), OperationType::ContractDeploy);

        let err = "invalid_type".parse::<OperationType>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Invalid transaction type"));
        assert!(message.contains("erc20_transfer"));
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(estimate(OperationType::ContractDeploy, U256::MAX).is_err());
    }

    #[tokio::test]
    async fn unknown_type_fails_before_any_rpc() {
        let client = client(&["https://node.example.com"], |_, _, _| ok(json!("0x1")), 1);
        let err = calculate_transaction_cost(&client, "teleport").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
        assert!(hits(&client).is_empty());
    }

    #[tokio::test]
    async fn uses_current_gas_price() {
        let client = client(&["https://node.example.com"], |_, _, _| ok(json!("0x4a817c800")), 1);
        let cost = calculate_transaction_cost(&client, "basic_transfer").await.unwrap();
        assert_eq!(cost.total_cost_gwei, 420_000.0);

        let text = format_cost_estimate(&cost);
        assert!(text.contains("Gas Limit: 21000 units"));
        assert!(text.contains("Estimated Cost: 420000 Gwei (0.000420000000000000 ETH)"));
    }
}
