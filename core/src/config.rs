use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::price::DEFAULT_PRICE_API;

pub const DEFAULT_RPC_URL: &str = "https://ethereum-rpc.publicnode.com";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 4;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Runtime settings for a watch session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub rpc_url: String,
    pub price_api_url: String,
    /// Token list file; `None` uses `tokens.json` in the data directory.
    pub token_list_path: Option<PathBuf>,
    /// Read-only mode: report this address instead of the node's accounts.
    pub watch_address: Option<String>,
    pub poll_interval_secs: u64,
    /// Auto-refresh period armed after startup; `None` leaves it off.
    pub auto_refresh_secs: Option<u64>,
    pub request_timeout_secs: u64,
    pub allow_insecure: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            price_api_url: DEFAULT_PRICE_API.to_string(),
            token_list_path: None,
            watch_address: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            auto_refresh_secs: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            allow_insecure: false,
        }
    }
}

impl WatchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn auto_refresh(&self) -> Option<Duration> {
        self.auto_refresh_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn parsed_watch_address(&self) -> Result<Option<Address>> {
        self.watch_address
            .as_deref()
            .map(|a| {
                a.trim()
                    .parse::<Address>()
                    .with_context(|| format!("Invalid watch address: {a}"))
            })
            .transpose()
    }

    pub fn token_list_path(&self) -> Result<PathBuf> {
        match &self.token_list_path {
            Some(path) => Ok(path.clone()),
            None => Ok(crate::data_dir()?.join(crate::registry::TOKEN_LIST_FILE)),
        }
    }
}
