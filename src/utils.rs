//! Utility functions shared by the MCP handler and the query services

use ethers_core::types::U256;
use ethers_core::utils::{format_ether, format_units};
use serde::de::DeserializeOwned;
use serde_json::{from_value, Value};

use crate::blockchain::models::ToolError;
use crate::mcp::protocol::{error_codes, Response};

/// Helper function to extract a required argument from a JSON object
pub fn get_required_arg<T: DeserializeOwned>(
    args: &Value,
    key: &str,
    req_id: &Value,
) -> Result<T, Response> {
    from_value(args.get(key).cloned().unwrap_or(Value::Null)).map_err(|_| {
        Response::error(
            req_id.clone(),
            error_codes::INVALID_PARAMS,
            format!("Missing or invalid required argument: '{}'", key),
        )
    })
}

/// Converts a wei amount to Gwei as a float, for display.
pub fn wei_to_gwei(wei: U256) -> Result<f64, ToolError> {
    let formatted = format_units(wei, "gwei")
        .map_err(|e| ToolError::Internal(format!("cannot format {} wei as gwei: {}", wei, e)))?;
    formatted
        .parse()
        .map_err(|e| ToolError::Internal(format!("cannot parse '{}' as gwei: {}", formatted, e)))
}

/// Formats a wei amount as an exact ETH decimal string.
pub fn wei_to_eth(wei: U256) -> String {
    format_ether(wei)
}

/// Serializes `U256` as a decimal string instead of the default hex quantity.
pub mod serde_decimal {
    use ethers_core::types::U256;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_wei_to_gwei_and_eth() {
        assert_eq!(wei_to_gwei(U256::from(20_000_000_000u64)).unwrap(), 20.0);
        assert_eq!(wei_to_gwei(U256::from(1_500_000_000u64)).unwrap(), 1.5);
        assert_eq!(wei_to_eth(U256::exp10(18)), "1.000000000000000000");
    }

    #[test]
    fn required_arg_errors_name_the_key() {
        let args = serde_json::json!({ "address": 42 });
        let err = get_required_arg::<String>(&args, "address", &Value::from(7)).unwrap_err();
        let error = err.error.unwrap();
        assert_eq!(error.code, error_codes::INVALID_PARAMS);
        assert!(error.message.contains("'address'"));
    }
}
