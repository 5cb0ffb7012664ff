/// Chain id normalization and the static chain support table.
use serde::{Deserialize, Serialize};

use crate::error::{Result, WatchError};

/// Chain id the widget asks the wallet to switch to on unsupported networks.
pub const MAINNET: ChainId = ChainId(1);

/// Normalized EVM chain id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainId(pub u64);

/// Chain id as reported by a provider: `eth_chainId` returns a hex string,
/// some providers hand back a plain number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawChainId {
    Number(u64),
    Text(String),
}

impl ChainId {
    /// Normalize a raw provider value. Accepts `0x`-prefixed hex, decimal
    /// strings and numbers.
    pub fn from_raw(raw: &RawChainId) -> Result<Self> {
        match raw {
            RawChainId::Number(n) => Ok(ChainId(*n)),
            RawChainId::Text(s) => s.parse(),
        }
    }

    /// `0x`-prefixed lowercase hex, the form `wallet_switchEthereumChain` expects.
    pub fn to_hex(self) -> String {
        format!("0x{:x}", self.0)
    }
}

impl std::str::FromStr for ChainId {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) if !hex.is_empty() => u64::from_str_radix(hex, 16),
            Some(_) => return Err(WatchError::InvalidChainId(s.to_string())),
            None => s.parse::<u64>(),
        };
        parsed
            .map(ChainId)
            .map_err(|_| WatchError::InvalidChainId(s.to_string()))
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static description of a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainInfo {
    pub chain_id: ChainId,
    pub name: String,
    pub explorer_base_url: String,
    pub supported: bool,
}

impl ChainInfo {
    /// Explorer link for an address, if the chain has an explorer.
    pub fn address_url(&self, address: &str) -> Option<String> {
        if self.explorer_base_url.is_empty() {
            return None;
        }
        Some(format!("{}/address/{address}", self.explorer_base_url))
    }

    /// Explorer link for a token contract, if the chain has an explorer.
    pub fn token_url(&self, token: &str) -> Option<String> {
        if self.explorer_base_url.is_empty() {
            return None;
        }
        Some(format!("{}/token/{token}", self.explorer_base_url))
    }
}

const KNOWN_CHAINS: &[(u64, &str, &str, bool)] = &[
    (1, "Ethereum Mainnet", "https://etherscan.io", true),
    (11155111, "Sepolia", "https://sepolia.etherscan.io", true),
    (17000, "Holesky", "https://holesky.etherscan.io", true),
    (5, "Goerli", "https://goerli.etherscan.io", false),
    (10, "Optimism", "https://optimistic.etherscan.io", false),
    (56, "BNB Smart Chain", "https://bscscan.com", false),
    (137, "Polygon", "https://polygonscan.com", false),
    (42161, "Arbitrum One", "https://arbiscan.io", false),
];

/// Look up a chain. Unknown ids get a synthesized unsupported entry.
pub fn chain_info(id: ChainId) -> ChainInfo {
    KNOWN_CHAINS
        .iter()
        .find(|(known, ..)| *known == id.0)
        .map(|&(_, name, explorer, supported)| ChainInfo {
            chain_id: id,
            name: name.to_string(),
            explorer_base_url: explorer.to_string(),
            supported,
        })
        .unwrap_or_else(|| ChainInfo {
            chain_id: id,
            name: format!("Unknown network ({id})"),
            explorer_base_url: String::new(),
            supported: false,
        })
}
