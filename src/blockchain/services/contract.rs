// src/blockchain/services/contract.rs

use std::str::FromStr;

use ethers_core::abi::{decode, ParamType, Token};
use ethers_core::types::{Address, Bytes, H256};
use ethers_core::utils::{id, to_checksum};
use tracing::{debug, info};

use crate::blockchain::{
    client::{ResilientClient, RpcError},
    models::{OwnershipInfo, ToolError},
    services::{address::parse_address, proxy},
    transport::RpcTransport,
};

/// Ownable-style getters, tried in order.
pub const OWNER_GETTERS: [&str; 4] = ["owner()", "getOwner()", "admin()", "getAdmin()"];

fn decode_owner(data: &Bytes) -> Option<Address> {
    let tokens = decode(&[ParamType::Address], data).ok()?;
    match tokens.into_iter().next()? {
        Token::Address(owner) if !owner.is_zero() => Some(owner),
        _ => None,
    }
}

/// Calls each owner getter on `target` until one returns a non-zero address.
///
/// Reverts, empty return data and undecodable output are misses. Losing every
/// endpoint is not a miss and is returned as an error.
async fn call_owner_getters<T: RpcTransport>(
    client: &ResilientClient<T>,
    target: Address,
) -> Result<Option<(Address, &'static str)>, ToolError> {
    for getter in OWNER_GETTERS {
        let calldata = Bytes::from(id(getter).to_vec());
        match client.eth_call(target, calldata).await {
            Ok(response) => match decode_owner(&response.value) {
                Some(owner) => return Ok(Some((owner, getter))),
                None => debug!(
                    "{} on {:?} returned no owner (0x{})",
                    getter,
                    target,
                    hex::encode(&response.value)
                ),
            },
            Err(RpcError::Rejected { message, .. }) => {
                debug!("{} on {:?} rejected: {}", getter, target, message)
            }
            Err(RpcError::InvalidResponseShape { reason, .. }) => {
                debug!("{} on {:?} returned unusable data: {}", getter, target, reason)
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(None)
}

/// Where OpenZeppelin's `Ownable` keeps `_owner` when it is the first state variable.
pub const OWNER_SLOT: H256 = H256([0u8; 32]);
pub const OWNER_SLOT_SOURCE: &str = "storage slot 0";

/// Reads slot 0 of `target` as an address. Only used once every getter missed,
/// since any contract may keep an unrelated address-shaped word there.
async fn read_owner_slot<T: RpcTransport>(
    client: &ResilientClient<T>,
    target: Address,
) -> Result<Option<Address>, ToolError> {
    match client.storage_at(target, OWNER_SLOT).await {
        Ok(response) => Ok(proxy::address_from_word(response.value)),
        Err(RpcError::Rejected { message, .. }) => {
            debug!("slot 0 of {:?} rejected: {}", target, message);
            Ok(None)
        }
        Err(RpcError::InvalidResponseShape { reason, .. }) => {
            debug!("slot 0 of {:?} unreadable: {}", target, reason);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Finds the owner of a contract, following an EIP-1967 proxy when the
/// contract itself does not answer any owner getter. When no getter answers
/// anywhere, slot 0 of the contract and then of its implementation is read.
pub async fn check_contract_owner<T: RpcTransport>(
    client: &ResilientClient<T>,
    address: &str,
) -> Result<OwnershipInfo, ToolError> {
    let contract = parse_address(address)?;
    if contract.is_zero() {
        return Err(ToolError::InvalidInput(
            "Invalid contract address: the zero address is not a contract".into(),
        ));
    }
    let contract_address = to_checksum(&contract, None);
    info!("Checking owner of contract {}", contract_address);

    if let Some((owner, getter)) = call_owner_getters(client, contract).await? {
        return Ok(OwnershipInfo {
            contract_address,
            owner_address: Some(to_checksum(&owner, None)),
            owner_source: Some(getter.to_string()),
            owner_from_implementation: false,
            is_proxy: false,
            implementation_address: None,
        });
    }

    let proxy_info = proxy::resolve(client, contract).await;
    let implementation = proxy_info
        .implementation_address
        .as_deref()
        .and_then(|s| Address::from_str(s).ok());

    let mut owner = match implementation {
        Some(implementation) => call_owner_getters(client, implementation)
            .await?
            .map(|(o, getter)| (o, getter, true)),
        None => None,
    };

    if owner.is_none() {
        owner = read_owner_slot(client, contract)
            .await?
            .map(|o| (o, OWNER_SLOT_SOURCE, false));
    }
    if owner.is_none() {
        if let Some(implementation) = implementation {
            owner = read_owner_slot(client, implementation)
                .await?
                .map(|o| (o, OWNER_SLOT_SOURCE, true));
        }
    }

    Ok(OwnershipInfo {
        contract_address,
        owner_address: owner.map(|(o, _, _)| to_checksum(&o, None)),
        owner_source: owner.map(|(_, source, _)| source.to_string()),
        owner_from_implementation: owner.is_some_and(|(_, _, from_impl)| from_impl),
        is_proxy: proxy_info.is_proxy,
        implementation_address: proxy_info.implementation_address,
    })
}

pub fn format_ownership(info: &OwnershipInfo) -> String {
    let mut lines = Vec::new();
    if let Some(implementation) = &info.implementation_address {
        lines.push(format!(
            "Proxy @ {} (EIP-1967) implementation contract: {}",
            info.contract_address, implementation
        ));
    }
    match (&info.owner_address, &info.owner_source) {
        (Some(owner), Some(getter)) if info.owner_from_implementation => {
            lines.push(format!("Implementation owner (via `{}`): {}", getter, owner))
        }
        (Some(owner), Some(getter)) => {
            lines.push(format!("Contract owner (via `{}`): {}", getter, owner))
        }
        _ => lines.push(
            "Contract does not implement an Ownable interface or owner could not be read."
                .to_string(),
        ),
    }
    lines.join("\n")
}
