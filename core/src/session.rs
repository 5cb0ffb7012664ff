use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::chain::{ChainInfo, RawChainId};
use crate::error::{Result, WatchError};
use crate::fetcher::BalanceFetcher;
use crate::monitor::NetworkMonitor;
use crate::provider::{EventKind, ProviderError, ProviderEvent, SubscriptionId, WalletProvider};
use crate::refresh::{AutoRefresh, RefreshOrchestrator};
use crate::registry::{TokenDescriptor, TokenRegistry};
use crate::render::{self, Renderer, Slot};

pub const CONNECT_FAILED: &str = "Failed to connect wallet";

/// State shared between the session and its background tasks. The active
/// chain lives in [`NetworkMonitor`].
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub account: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected(String),
}

#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub state: ConnectionState,
    pub chain: Option<ChainInfo>,
    pub auto_refresh: Option<Duration>,
    pub token_count: usize,
}

/// Connection lifecycle: owns the session context, the event subscriptions
/// and the auto-refresh timer.
pub struct Session {
    provider: Arc<dyn WalletProvider>,
    orchestrator: Arc<RefreshOrchestrator>,
    registry: Arc<RwLock<TokenRegistry>>,
    renderer: Arc<dyn Renderer>,
    monitor: NetworkMonitor,
    context: Arc<RwLock<SessionContext>>,
    timer: AutoRefresh,
    accounts_sub: Option<SubscriptionId>,
    chain_sub: Option<SubscriptionId>,
    events_tx: UnboundedSender<ProviderEvent>,
    events_rx: Option<UnboundedReceiver<ProviderEvent>>,
}

impl Session {
    pub fn new(
        provider: Arc<dyn WalletProvider>,
        fetcher: BalanceFetcher,
        registry: TokenRegistry,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        renderer.reset(&render::placeholders(registry.list()));
        let registry = Arc::new(RwLock::new(registry));
        let orchestrator = Arc::new(RefreshOrchestrator::new(
            Arc::new(fetcher),
            registry.clone(),
            renderer.clone(),
        ));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            provider,
            orchestrator,
            registry,
            monitor: NetworkMonitor::new(renderer.clone()),
            renderer,
            context: Arc::new(RwLock::new(SessionContext::default())),
            timer: AutoRefresh::new(),
            accounts_sub: None,
            chain_sub: None,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Hand out the receiving end of the provider event channel. Events
    /// received there go back through [`Session::handle_event`].
    pub fn take_events(&mut self) -> Option<UnboundedReceiver<ProviderEvent>> {
        self.events_rx.take()
    }

    pub fn context(&self) -> &Arc<RwLock<SessionContext>> {
        &self.context
    }

    pub async fn account(&self) -> Option<String> {
        self.context.read().await.account.clone()
    }

    pub async fn state(&self) -> ConnectionState {
        match self.account().await {
            Some(account) => ConnectionState::Connected(account),
            None => ConnectionState::Disconnected,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.accounts_sub.is_some() || self.chain_sub.is_some()
    }

    /// Ask the wallet for access and bring the session up.
    pub async fn connect(&mut self) -> Result<String> {
        let accounts = match self.provider.request_accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!("wallet connection failed: {e}");
                self.fail_connect().await;
                return Err(e.into());
            }
        };
        let Some(account) = first_account(accounts) else {
            warn!("wallet returned no accounts");
            self.fail_connect().await;
            return Err(WatchError::NoAccounts);
        };
        self.establish(account.clone()).await;
        Ok(account)
    }

    /// Cold start: reuse an already authorized account without prompting.
    pub async fn probe(&mut self) -> Option<String> {
        match self.provider.current_accounts().await {
            Ok(accounts) => {
                let account = first_account(accounts)?;
                self.establish(account.clone()).await;
                Some(account)
            }
            Err(e) => {
                debug!("startup probe found no wallet: {e}");
                None
            }
        }
    }

    /// Disconnect when connected, connect otherwise.
    pub async fn toggle(&mut self) -> Result<Option<String>> {
        if self.account().await.is_some() {
            self.disconnect().await;
            Ok(None)
        } else {
            self.connect().await.map(Some)
        }
    }

    /// Tear the session down locally. Authorization at the wallet is kept.
    pub async fn disconnect(&mut self) {
        self.unsubscribe_all();
        if let Some(account) = self.context.write().await.account.take() {
            info!("disconnected {account}");
        }
        self.monitor.clear();
        self.timer.cancel();
        let tokens = self.registry.read().await.snapshot();
        self.renderer.reset(&render::placeholders(&tokens));
    }

    pub async fn handle_event(&mut self, event: ProviderEvent) {
        if !self.is_subscribed() {
            debug!("ignoring {} event after disconnect", event.kind());
            return;
        }
        match event {
            ProviderEvent::AccountsChanged(accounts) => match first_account(accounts) {
                None => {
                    info!("wallet reported no accounts");
                    self.disconnect().await;
                }
                Some(account) => {
                    info!("account changed to {account}");
                    self.context.write().await.account = Some(account.clone());
                    self.render_account(&account);
                    self.refresh_logged(&account).await;
                }
            },
            ProviderEvent::ChainChanged(raw) => {
                self.apply_chain(&raw).await;
                if let Some(account) = self.account().await {
                    self.refresh_logged(&account).await;
                }
            }
        }
    }

    /// Full refresh for the connected account.
    pub async fn refresh(&self) -> Result<()> {
        let account = self.account().await.ok_or(WatchError::NotConnected)?;
        self.orchestrator.refresh(&account).await
    }

    /// Arm (or with `None`/zero, cancel) periodic refresh.
    pub fn set_auto_refresh(&mut self, interval: Option<Duration>) {
        match interval.filter(|d| !d.is_zero()) {
            Some(interval) => {
                self.timer
                    .set(interval, self.orchestrator.clone(), self.context.clone())
            }
            None => self.timer.cancel(),
        }
    }

    pub fn auto_refresh(&self) -> Option<Duration> {
        self.timer.interval()
    }

    pub async fn switch_to_mainnet(&self) -> Result<()> {
        self.monitor.request_mainnet(self.provider.as_ref()).await
    }

    /// Start watching a token; its slot is filled right away when connected.
    pub async fn add_token(&mut self, address: &str, note: &str) -> Result<TokenDescriptor> {
        let token = self.registry.write().await.add(address, note)?.clone();
        info!("watching token {}", token.address);
        match self.account().await {
            Some(account) => self.orchestrator.refresh_token(&account, &token).await,
            None => self
                .renderer
                .render(Slot::token(&token.address), render::token_placeholder(&token)),
        }
        Ok(token)
    }

    /// Stop watching a token. Removing the first entry moves the primary
    /// slot on to the next one.
    pub async fn remove_token(&mut self, address: &str) -> Result<TokenDescriptor> {
        let (token, next_primary) = {
            let mut registry = self.registry.write().await;
            let primary = registry.primary().map(TokenDescriptor::key);
            let token = registry.remove(address)?;
            let next = (primary == Some(token.key())).then(|| registry.primary().cloned());
            (token, next)
        };
        info!("stopped watching token {}", token.address);
        self.renderer.clear(&Slot::token(&token.address));

        if let Some(next) = next_primary {
            match self.account().await {
                Some(account) => {
                    self.orchestrator
                        .refresh_primary(&account, next.as_ref())
                        .await;
                }
                None => self
                    .renderer
                    .render(Slot::Primary, Slot::Primary.placeholder()),
            }
        }
        Ok(token)
    }

    pub async fn tokens(&self) -> Vec<TokenDescriptor> {
        self.registry.read().await.snapshot()
    }

    pub async fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state().await,
            chain: self.monitor.current_info(),
            auto_refresh: self.timer.interval(),
            token_count: self.registry.read().await.list().len(),
        }
    }

    async fn establish(&mut self, account: String) {
        info!("connected {account}");
        self.context.write().await.account = Some(account.clone());
        self.subscribe_all();
        self.render_account(&account);

        match self.provider.chain_id().await {
            Ok(raw) => self.apply_chain(&raw).await,
            Err(e) => warn!("could not read chain id: {e}"),
        }
        self.refresh_logged(&account).await;
    }

    async fn fail_connect(&mut self) {
        self.disconnect().await;
        self.renderer.render(Slot::Account, CONNECT_FAILED.to_string());
    }

    async fn apply_chain(&mut self, raw: &RawChainId) {
        if let Err(e) = self.monitor.update(raw) {
            warn!("ignoring chain change: {e}");
        }
    }

    async fn refresh_logged(&self, account: &str) {
        if let Err(e) = self.orchestrator.refresh(account).await {
            warn!("refresh failed: {e}");
        }
    }

    fn render_account(&self, account: &str) {
        self.renderer
            .render(Slot::Account, format!("Connected: {account}"));
    }

    fn subscribe_all(&mut self) {
        if self.accounts_sub.is_none() {
            self.accounts_sub = self.subscribe(EventKind::AccountsChanged);
        }
        if self.chain_sub.is_none() {
            self.chain_sub = self.subscribe(EventKind::ChainChanged);
        }
    }

    fn subscribe(&self, kind: EventKind) -> Option<SubscriptionId> {
        match self.provider.subscribe(kind, self.events_tx.clone()) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("cannot subscribe to {kind}: {e}");
                None
            }
        }
    }

    fn unsubscribe_all(&mut self) {
        for id in [self.accounts_sub.take(), self.chain_sub.take()]
            .into_iter()
            .flatten()
        {
            match self.provider.unsubscribe(id) {
                Ok(()) | Err(ProviderError::Unsupported(_)) => {}
                Err(e) => warn!("unsubscribe failed: {e}"),
            }
        }
    }
}

fn first_account(accounts: Vec<String>) -> Option<String> {
    accounts.into_iter().next().filter(|a| !a.trim().is_empty())
}
