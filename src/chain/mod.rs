//! Chain identity, network selection, and JSON-RPC access.

pub mod client;
pub mod endpoint;
pub mod events;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use client::{new_chain_client, ChainClient, EvmClient, LogQuery};
pub use endpoint::{rpc_endpoint, RpcEndpoint};

/// Numeric chain id plus the human name used to scope rows and cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainIdentity {
    pub id: u64,
    pub name: String,
}

impl ChainIdentity {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Network with a dedicated order-book indexer, if any.
    #[must_use]
    pub fn kind(&self) -> Option<ChainKind> {
        ChainKind::from_chain_id(self.id)
    }
}

impl fmt::Display for ChainIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Networks the order-book indexer supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainKind {
    Ethereum,
    Optimism,
    Sepolia,
}

impl ChainKind {
    pub const ETHEREUM_CHAIN_ID: u64 = 1;
    pub const OPTIMISM_CHAIN_ID: u64 = 10;
    pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

    #[must_use]
    pub fn from_chain_id(id: u64) -> Option<Self> {
        match id {
            Self::ETHEREUM_CHAIN_ID => Some(Self::Ethereum),
            Self::OPTIMISM_CHAIN_ID => Some(Self::Optimism),
            Self::SEPOLIA_CHAIN_ID => Some(Self::Sepolia),
            _ => None,
        }
    }

    #[must_use]
    pub fn chain_id(self) -> u64 {
        match self {
            Self::Ethereum => Self::ETHEREUM_CHAIN_ID,
            Self::Optimism => Self::OPTIMISM_CHAIN_ID,
            Self::Sepolia => Self::SEPOLIA_CHAIN_ID,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Optimism => "optimism",
            Self::Sepolia => "sepolia",
        }
    }

    /// Blocks kept behind the head before logs are read.
    #[must_use]
    pub fn confirmations(self) -> u64 {
        match self {
            Self::Ethereum | Self::Sepolia => 1,
            Self::Optimism => 2,
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_chain_ids_select_a_kind() {
        assert_eq!(ChainKind::from_chain_id(1), Some(ChainKind::Ethereum));
        assert_eq!(ChainKind::from_chain_id(10), Some(ChainKind::Optimism));
        assert_eq!(
            ChainKind::from_chain_id(11155111),
            Some(ChainKind::Sepolia)
        );
        assert_eq!(ChainKind::from_chain_id(99999), None);
    }

    #[test]
    fn kind_roundtrips_chain_id() {
        for kind in [ChainKind::Ethereum, ChainKind::Optimism, ChainKind::Sepolia] {
            assert_eq!(ChainKind::from_chain_id(kind.chain_id()), Some(kind));
        }
    }

    #[test]
    fn identity_display_has_name_and_id() {
        let chain = ChainIdentity::new(10, "optimism");
        assert_eq!(chain.to_string(), "optimism (10)");
        assert_eq!(chain.kind(), Some(ChainKind::Optimism));
    }
}
