//! Chain identifiers and the static chain registry.
//!
//! The registry is the single source of network metadata: display names,
//! public RPC endpoints, explorers, native currencies and the data-provider
//! network slug used to build API endpoints.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// An EVM chain identifier.
///
/// Rendered as `0x`-prefixed lowercase hex, the form wallets use on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(u64);

impl ChainId {
    pub const ETHEREUM: ChainId = ChainId(0x1);
    pub const OPTIMISM: ChainId = ChainId(0xa);
    pub const POLYGON: ChainId = ChainId(0x89);
    pub const ARBITRUM: ChainId = ChainId(0xa4b1);

    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl FromStr for ChainId {
    type Err = ParseError;

    /// Accepts `0x`-prefixed hex or plain decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) if !hex.is_empty() => u64::from_str_radix(hex, 16),
            Some(_) => return Err(ParseError::ChainId(s.to_string())),
            None => s.parse::<u64>(),
        };
        parsed
            .map(ChainId)
            .map_err(|_| ParseError::ChainId(s.to_string()))
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Network metadata for one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainInfo {
    pub id: ChainId,
    pub name: &'static str,
    pub rpc_url: &'static str,
    /// Native currency symbol
    pub currency: &'static str,
    /// Native currency display name
    pub currency_name: &'static str,
    pub explorer_url: &'static str,
    /// Network slug understood by the data provider
    pub data_network: &'static str,
}

impl ChainInfo {
    /// Explorer page for a transaction hash.
    pub fn tx_url(&self, hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), hash)
    }
}

/// Chains known out of the box.
pub const BUILTIN_CHAINS: &[ChainInfo] = &[
    ChainInfo {
        id: ChainId::ETHEREUM,
        name: "Ethereum",
        rpc_url: "https://eth.llamarpc.com",
        currency: "ETH",
        currency_name: "Ether",
        explorer_url: "https://etherscan.io",
        data_network: "eth-mainnet",
    },
    ChainInfo {
        id: ChainId::POLYGON,
        name: "Polygon",
        rpc_url: "https://polygon.llamarpc.com",
        currency: "MATIC",
        currency_name: "Matic",
        explorer_url: "https://polygonscan.com",
        data_network: "polygon-mainnet",
    },
    ChainInfo {
        id: ChainId::ARBITRUM,
        name: "Arbitrum One",
        rpc_url: "https://arb1.arbitrum.io/rpc",
        currency: "ETH",
        currency_name: "Ether",
        explorer_url: "https://arbiscan.io",
        data_network: "arb-mainnet",
    },
    ChainInfo {
        id: ChainId::OPTIMISM,
        name: "Optimism",
        rpc_url: "https://mainnet.optimism.io",
        currency: "ETH",
        currency_name: "Ether",
        explorer_url: "https://optimistic.etherscan.io",
        data_network: "opt-mainnet",
    },
];

/// Lookup table from [`ChainId`] to [`ChainInfo`].
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<ChainInfo>,
    default_chain: ChainId,
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ChainRegistry {
    /// Registry over [`BUILTIN_CHAINS`] with Ethereum as the default.
    pub fn builtin() -> Self {
        Self {
            chains: BUILTIN_CHAINS.to_vec(),
            default_chain: ChainId::ETHEREUM,
        }
    }

    /// Build a registry from an explicit table.
    ///
    /// Returns `None` if `default_chain` is not part of `chains`.
    pub fn new(chains: Vec<ChainInfo>, default_chain: ChainId) -> Option<Self> {
        if !chains.iter().any(|c| c.id == default_chain) {
            return None;
        }
        Some(Self {
            chains,
            default_chain,
        })
    }

    /// Same table with a different default chain.
    pub fn with_default(mut self, default_chain: ChainId) -> Option<Self> {
        if !self.contains(default_chain) {
            return None;
        }
        self.default_chain = default_chain;
        Some(self)
    }

    pub fn get(&self, id: ChainId) -> Option<&ChainInfo> {
        self.chains.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: ChainId) -> bool {
        self.get(id).is_some()
    }

    pub fn default_chain(&self) -> ChainId {
        self.default_chain
    }

    /// Metadata for `id`, or for the default chain when `id` is unknown.
    pub fn resolve(&self, id: ChainId) -> &ChainInfo {
        self.get(id)
            .or_else(|| self.get(self.default_chain))
            .unwrap_or_else(|| &self.chains[0])
    }

    pub fn supported(&self) -> &[ChainInfo] {
        &self.chains
    }
}
