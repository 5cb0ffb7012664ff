use std::path::PathBuf;

use anyhow::Context;

pub mod chain;
pub mod commands;
pub mod config;
pub mod display;
pub mod error;
pub mod fetcher;
pub mod monitor;
pub mod price;
pub mod provider;
pub mod refresh;
pub mod registry;
pub mod render;
pub mod rpc;
pub mod session;

pub use chain::{chain_info, ChainId, ChainInfo, RawChainId};
pub use commands::Command;
pub use config::WatchConfig;
pub use error::WatchError;
pub use fetcher::{BalanceFetcher, BalanceResult, CallOutcome};
pub use monitor::NetworkMonitor;
pub use price::{CoinGeckoClient, PriceCache, PriceOracle, PriceSource};
pub use provider::{
    ChainReader, EventKind, ProviderError, ProviderEvent, SubscriptionId, WalletProvider,
};
pub use refresh::{AutoRefresh, RefreshOrchestrator};
pub use registry::{
    JsonTokenStore, MemoryTokenStore, TokenDescriptor, TokenListStore, TokenRegistry,
};
pub use render::{NetworkWarning, Renderer, Slot, SlotBoard};
pub use rpc::EthRpc;
pub use session::{ConnectionState, Session, SessionContext, SessionStatus};

pub use ethers::types::{Address, U256};

/// XDG-compliant data directory for the token list.
/// Linux: `~/.local/share/walletwatch/`, macOS: `~/Library/Application Support/walletwatch/`
pub fn data_dir() -> anyhow::Result<PathBuf> {
    let dir = dirs::data_dir()
        .context("Cannot determine data directory")?
        .join("walletwatch");
    Ok(dir)
}

/// Wire a session from configuration: JSON-RPC wallet and reader, CoinGecko
/// prices and the on-disk token list, all rendering to `renderer`.
pub fn build_session(
    config: &WatchConfig,
    renderer: std::sync::Arc<dyn Renderer>,
) -> anyhow::Result<Session> {
    use std::sync::Arc;

    let rpc = Arc::new(
        EthRpc::new(&config.rpc_url, config.request_timeout(), config.allow_insecure)?
            .with_watch_address(config.parsed_watch_address()?)
            .with_poll_interval(config.poll_interval()),
    );
    let prices = Arc::new(PriceOracle::new(Arc::new(CoinGeckoClient::new(
        &config.price_api_url,
        config.request_timeout(),
    )?)));
    let fetcher = BalanceFetcher::new(rpc.clone(), prices)?;
    let store = JsonTokenStore::at(config.token_list_path()?);
    let registry = TokenRegistry::load(Box::new(store));
    Ok(Session::new(rpc, fetcher, registry, renderer))
}
