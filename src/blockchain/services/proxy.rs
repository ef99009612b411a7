// src/blockchain/services/proxy.rs

use ethers_core::types::{Address, H256};
use tracing::{info, warn};

use crate::blockchain::{
    client::ResilientClient,
    models::{ProxyInfo, ToolError},
    transport::RpcTransport,
};

/// EIP-1967 implementation slot: `keccak256("eip1967.proxy.implementation") - 1`.
pub const EIP1967_IMPLEMENTATION_SLOT: H256 = H256([
    0x36, 0x08, 0x94, 0xa1, 0x3b, 0xa1, 0xa3, 0x21, 0x06, 0x67, 0xc8, 0x28, 0x49, 0x2d, 0xb9, 0x8d,
    0xca, 0x3e, 0x20, 0x76, 0xcc, 0x37, 0x35, 0xa9, 0x20, 0xa3, 0xca, 0x50, 0x5d, 0x38, 0x2b, 0xbc,
]);

/// Interprets a storage word as an address: the 12 leading bytes must be zero
/// and the remaining 20 must not be.
pub fn address_from_word(word: H256) -> Option<Address> {
    let (padding, tail) = word.as_bytes().split_at(12);
    if padding.iter().any(|b| *b != 0) || tail.iter().all(|b| *b == 0) {
        return None;
    }
    Some(Address::from_slice(tail))
}

/// Reads the EIP-1967 implementation slot. RPC failures are returned.
pub async fn try_resolve<T: RpcTransport>(
    client: &ResilientClient<T>,
    contract: Address,
) -> Result<ProxyInfo, ToolError> {
    let response = client
        .storage_at(contract, EIP1967_IMPLEMENTATION_SLOT)
        .await
        .map_err(|source| ToolError::ProxyResolutionFailed {
            address: format!("{:?}", contract),
            source,
        })?;

    Ok(match address_from_word(response.value) {
        Some(implementation) => {
            info!(
                "EIP-1967 proxy {:?} points at implementation {:?} (via {})",
                contract, implementation, response.endpoint
            );
            ProxyInfo::eip1967(implementation)
        }
        None => ProxyInfo::not_a_proxy(),
    })
}

/// Like [`try_resolve`], but a failed read degrades to "not a proxy".
pub async fn resolve<T: RpcTransport>(client: &ResilientClient<T>, contract: Address) -> ProxyInfo {
    match try_resolve(client, contract).await {
        Ok(info) => info,
        Err(e) => {
            warn!("{}; reporting contract as not a proxy", e);
            ProxyInfo::not_a_proxy()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use ethers_core::types::U256;
    use ethers_core::utils::keccak256;
    use serde_json::{json, Value};

    use super::*;
    use crate::blockchain::client::test_support::*;
    use crate::blockchain::models::ProxyPattern;
    use crate::blockchain::transport::RpcFailure;

    const NODE: &str = "https://node.example.com";

    fn word(hex: &str) -> Value {
        json!(hex)
    }

    #[test]
    fn slot_matches_eip1967_derivation() {
        let hash = U256::from_big_endian(&keccak256("eip1967.proxy.implementation"));
        let mut expected = [0u8; 32];
        (hash - U256::one()).to_big_endian(&mut expected);
        assert_eq!(EIP1967_IMPLEMENTATION_SLOT, H256(expected));
    }

    #[test]
    fn word_must_be_a_left_padded_non_zero_address() {
        let addr = Address::from_str("0x43506849d7c04f9138d1a2050bbf3a0c054402dd").unwrap();
        let mut padded = [0u8; 32];
        padded[12..].copy_from_slice(addr.as_bytes());
        assert_eq!(address_from_word(H256(padded)), Some(addr));

        assert_eq!(address_from_word(H256::zero()), None);

        let mut dirty = padded;
        dirty[0] = 1;
        assert_eq!(address_from_word(H256(dirty)), None);
    }

    #[tokio::test]
    async fn reports_implementation_from_slot() {
        let client = client(
            &[NODE],
            |_, payload, _| {
                assert_eq!(payload["method"], "eth_getStorageAt");
                assert_eq!(
                    payload["params"][1],
                    "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc"
                );
                ok(word("0x00000000000000000000000043506849d7c04f9138d1a2050bbf3a0c054402dd"))
            },
            1,
        );

        let info = resolve(&client, Address::repeat_byte(0xaa)).await;
        let implementation =
            Address::from_str("0x43506849d7c04f9138d1a2050bbf3a0c054402dd").unwrap();
        assert!(info.is_proxy);
        assert_eq!(info.pattern_matched, ProxyPattern::Eip1967);
        assert_eq!(
            info.implementation_address,
            Some(ethers_core::utils::to_checksum(&implementation, None))
        );
    }

    #[tokio::test]
    async fn zero_slot_is_not_a_proxy() {
        let client = client(
            &[NODE],
            |_, _, _| ok(word("0x0000000000000000000000000000000000000000000000000000000000000000")),
            1,
        );

        let info = resolve(&client, Address::repeat_byte(0xaa)).await;
        assert_eq!(info, ProxyInfo::not_a_proxy());
    }

    #[tokio::test]
    async fn failed_read_degrades_to_not_a_proxy() {
        let client = client(&[NODE], |_, _, _| Err(RpcFailure::Timeout), 2);

        assert!(matches!(
            try_resolve(&client, Address::repeat_byte(0xaa)).await,
            Err(ToolError::ProxyResolutionFailed { .. })
        ));
        assert_eq!(
            resolve(&client, Address::repeat_byte(0xaa)).await,
            ProxyInfo::not_a_proxy()
        );
    }
}
