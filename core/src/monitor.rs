/// Active-chain tracking and classification.
use std::sync::Arc;

use tracing::info;

use crate::chain::{chain_info, ChainId, ChainInfo, RawChainId, MAINNET};
use crate::error::Result;
use crate::provider::WalletProvider;
use crate::render::{NetworkWarning, Renderer, NETWORK_PLACEHOLDER};

pub struct NetworkMonitor {
    current: Option<ChainId>,
    renderer: Arc<dyn Renderer>,
}

impl NetworkMonitor {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            current: None,
            renderer,
        }
    }

    pub fn current(&self) -> Option<ChainId> {
        self.current
    }

    pub fn current_info(&self) -> Option<ChainInfo> {
        self.current.map(chain_info)
    }

    /// Record a chain transition and render label and warning.
    /// An unparseable id leaves the previous state untouched.
    pub fn update(&mut self, raw: &RawChainId) -> Result<ChainInfo> {
        let id = ChainId::from_raw(raw)?;
        let info = chain_info(id);
        if self.current != Some(id) {
            info!("network is now {} ({id})", info.name);
        }
        self.current = Some(id);

        self.renderer
            .set_network_label(format!("{} (chain {})", info.name, info.chain_id));
        self.renderer.set_network_warning(if info.supported {
            None
        } else {
            Some(NetworkWarning::SwitchToMainnet)
        });
        Ok(info)
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.renderer.set_network_label(NETWORK_PLACEHOLDER.to_string());
        self.renderer.set_network_warning(None);
    }

    /// Ask the wallet to switch to Ethereum Mainnet.
    pub async fn request_mainnet(&self, provider: &dyn WalletProvider) -> Result<()> {
        provider.request_chain_switch(&MAINNET.to_hex()).await?;
        Ok(())
    }
}
