//! Registry of the x402 V1 network names that map to EVM chains.
//!
//! V1 challenges name their network ("base-sepolia") instead of carrying a
//! CAIP-2 chain id, so signing needs this table to build the EIP-712 domain.

use std::collections::HashMap;
use std::sync::LazyLock;

/// A known EVM network: its V1 name and EIP-155 chain id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    pub name: &'static str,
    pub chain_id: u64,
}

pub static KNOWN_NETWORKS: &[NetworkInfo] = &[
    // Base
    NetworkInfo {
        name: "base",
        chain_id: 8453,
    },
    NetworkInfo {
        name: "base-sepolia",
        chain_id: 84532,
    },
    // Polygon
    NetworkInfo {
        name: "polygon",
        chain_id: 137,
    },
    NetworkInfo {
        name: "polygon-amoy",
        chain_id: 80002,
    },
    // Avalanche
    NetworkInfo {
        name: "avalanche",
        chain_id: 43114,
    },
    NetworkInfo {
        name: "avalanche-fuji",
        chain_id: 43113,
    },
    // Sei
    NetworkInfo {
        name: "sei",
        chain_id: 1329,
    },
    NetworkInfo {
        name: "sei-testnet",
        chain_id: 1328,
    },
    NetworkInfo {
        name: "xdc",
        chain_id: 50,
    },
    NetworkInfo {
        name: "xrpl-evm",
        chain_id: 1440000,
    },
    NetworkInfo {
        name: "peaq",
        chain_id: 3338,
    },
    NetworkInfo {
        name: "iotex",
        chain_id: 4689,
    },
    // Celo
    NetworkInfo {
        name: "celo",
        chain_id: 42220,
    },
    NetworkInfo {
        name: "celo-sepolia",
        chain_id: 11142220,
    },
];

static NAME_TO_CHAIN_ID: LazyLock<HashMap<&'static str, u64>> = LazyLock::new(|| {
    KNOWN_NETWORKS
        .iter()
        .map(|n| (n.name, n.chain_id))
        .collect()
});

/// Looks up the EIP-155 chain id for a V1 network name. Case-sensitive.
pub fn chain_id_by_network_name(name: &str) -> Option<u64> {
    NAME_TO_CHAIN_ID.get(name).copied()
}
