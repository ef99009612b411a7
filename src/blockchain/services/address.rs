// src/blockchain/services/address.rs

use std::str::FromStr;

use ethers_core::types::Address;
use ethers_core::utils::to_checksum;

use crate::blockchain::models::{AddressValidation, ToolError};

/// `0x` followed by exactly 40 hex digits.
pub fn has_address_format(input: &str) -> bool {
    input
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Validates an address string without touching the network.
///
/// Mixed-case input is checked against its EIP-55 checksum. Single-case input
/// carries no checksum, so `checksum_valid` is `None` unless it already equals
/// its checksummed form (e.g. an address made only of digits).
pub fn validate_address(input: &str) -> AddressValidation {
    let trimmed = input.trim();
    if !has_address_format(trimmed) {
        return AddressValidation {
            input: input.to_string(),
            valid: false,
            checksum_valid: None,
            normalized_address: None,
            is_zero_address: false,
        };
    }

    // Format was checked above, so parsing cannot fail on well-formed hex.
    let address = Address::from_str(trimmed).unwrap_or_default();
    let checksummed = to_checksum(&address, None);

    let hex = &trimmed[2..];
    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());
    let checksum_valid = if trimmed == checksummed {
        Some(true)
    } else if has_lower && has_upper {
        Some(false)
    } else {
        None
    };

    AddressValidation {
        input: input.to_string(),
        valid: true,
        checksum_valid,
        normalized_address: Some(checksummed),
        is_zero_address: address.is_zero(),
    }
}

/// Parses a user-supplied address, rejecting bad format and bad checksums.
pub fn parse_address(input: &str) -> Result<Address, ToolError> {
    let validation = validate_address(input);
    if !validation.valid {
        return Err(ToolError::InvalidInput(format!(
            "Invalid Ethereum address '{}': expected 0x followed by 40 hex characters",
            input
        )));
    }
    if validation.checksum_valid == Some(false) {
        return Err(ToolError::InvalidInput(format!(
            "Invalid Ethereum address '{}': mixed-case checksum does not match",
            input
        )));
    }
    Address::from_str(input.trim())
        .map_err(|e| ToolError::InvalidInput(format!("Invalid Ethereum address '{}': {}", input, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VITALIK: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

    #[test]
    fn accepts_checksummed_address() {
        let v = validate_address(VITALIK);
        assert!(v.valid);
        assert_eq!(v.checksum_valid, Some(true));
        assert_eq!(v.normalized_address.as_deref(), Some(VITALIK));
        assert!(!v.is_zero_address);
    }

    #[test]
    fn lowercase_has_no_checksum_but_normalizes() {
        let v = validate_address(&VITALIK.to_lowercase());
        assert!(v.valid);
        assert_eq!(v.checksum_valid, None);
        assert_eq!(v.normalized_address.as_deref(), Some(VITALIK));
    }

    #[test]
    fn detects_bad_mixed_case_checksum() {
        let broken = VITALIK.replace("Cc", "cC");
        let v = validate_address(&broken);
        assert!(v.valid);
        assert_eq!(v.checksum_valid, Some(false));
        assert!(parse_address(&broken).is_err());
    }

    #[test]
    fn rejects_malformed_input() {
        for input in [
            "",
            "0x",
            "0x123",
            "0xinvalid",
            "742d35Cc6634C0532925a3b844Bc454e4438f44e",
            "0x742d35Cc6634C0532925a3b844Bc454e4438f44",
            "0x742d35Cc6634C0532925a3b844Bc454e4438f44e0",
            "0x742d35Cc6634C0532925a3b844Bc454e4438f4zz",
        ] {
            let v = validate_address(input);
            assert!(!v.valid, "{} should be invalid", input);
            assert_eq!(v.checksum_valid, None);
            assert!(parse_address(input).is_err());
        }
    }

    #[test]
    fn checksum_validation_is_idempotent() {
        let inputs = [
            VITALIK.to_lowercase(),
            VITALIK.to_uppercase().replacen("0X", "0x", 1),
            "0x0000000000000000000000000000000000000000".to_string(),
            "0x1234567890123456789012345678901234567890".to_string(),
            "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
            "0xffffffffffffffffffffffffffffffffffffffff".to_string(),
        ];
        for input in inputs {
            let first = validate_address(&input);
            let normalized = first.normalized_address.unwrap();
            let second = validate_address(&normalized);
            assert!(second.valid);
            assert_eq!(second.checksum_valid, Some(true), "{}", normalized);
            assert_eq!(second.normalized_address, Some(normalized));
        }
    }

    #[test]
    fn flags_zero_address() {
        let v = validate_address("0x0000000000000000000000000000000000000000");
        assert!(v.valid);
        assert!(v.is_zero_address);
    }
}
