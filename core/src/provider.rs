//! Capability traits for the external systems the watcher sits on.
//!
//! `WalletProvider` models an injected wallet (EIP-1193 style), `ChainReader`
//! the RPC/contract-call library. Concrete implementations live in
//! [`crate::rpc`]; tests supply in-memory fakes.

use async_trait::async_trait;
use ethers::abi::{Abi, Token};
use ethers::types::{Address, U256};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::chain::RawChainId;

/// Failure classes a wallet provider can report.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// Provider cannot be reached at all.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    /// User declined the request (EIP-1193 code 4001).
    #[error("{0}")]
    Rejected(String),
    /// Provider does not implement the method.
    #[error("unsupported by provider: {0}")]
    Unsupported(String),
    /// Any other RPC failure.
    #[error("{0}")]
    Rpc(String),
}

/// Events a provider can push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AccountsChanged,
    ChainChanged,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccountsChanged => write!(f, "accountsChanged"),
            Self::ChainChanged => write!(f, "chainChanged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<String>),
    ChainChanged(RawChainId),
}

impl ProviderEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::AccountsChanged(_) => EventKind::AccountsChanged,
            Self::ChainChanged(_) => EventKind::ChainChanged,
        }
    }
}

/// Handle returned by `subscribe`, needed to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the wallet for account access (may prompt the user).
    async fn request_accounts(&self) -> Result<Vec<String>, ProviderError>;

    /// Accounts already authorized, without prompting.
    async fn current_accounts(&self) -> Result<Vec<String>, ProviderError>;

    async fn chain_id(&self) -> Result<RawChainId, ProviderError>;

    /// Ask the wallet to switch to `chain_id_hex` (e.g. `"0x1"`).
    async fn request_chain_switch(&self, chain_id_hex: &str) -> Result<(), ProviderError>;

    /// Deliver events of `kind` to `sender` until unsubscribed.
    fn subscribe(
        &self,
        kind: EventKind,
        sender: UnboundedSender<ProviderEvent>,
    ) -> Result<SubscriptionId, ProviderError>;

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Native balance in wei.
    async fn native_balance(&self, address: Address) -> anyhow::Result<U256>;

    /// Read-only contract call; returns the decoded outputs.
    async fn call_method(
        &self,
        contract: Address,
        abi: &Abi,
        method: &str,
        args: Vec<Token>,
    ) -> anyhow::Result<Vec<Token>>;
}
