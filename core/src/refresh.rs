/// Balance refresh: one pass over native, primary and every watched token,
/// plus the periodic auto-refresh timer.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::display::{self, NATIVE_SYMBOL};
use crate::error::{Result, WatchError};
use crate::fetcher::BalanceFetcher;
use crate::registry::{TokenDescriptor, TokenRegistry};
use crate::render::{Renderer, Slot};
use crate::session::SessionContext;

/// Ends the loading indicator when dropped, on every exit path.
struct LoadingGuard<'a> {
    renderer: &'a dyn Renderer,
}

impl<'a> LoadingGuard<'a> {
    fn start(renderer: &'a dyn Renderer) -> Self {
        renderer.set_loading(true);
        Self { renderer }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.renderer.set_loading(false);
    }
}

pub struct RefreshOrchestrator {
    fetcher: Arc<BalanceFetcher>,
    registry: Arc<RwLock<TokenRegistry>>,
    renderer: Arc<dyn Renderer>,
}

impl RefreshOrchestrator {
    pub fn new(
        fetcher: Arc<BalanceFetcher>,
        registry: Arc<RwLock<TokenRegistry>>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            fetcher,
            registry,
            renderer,
        }
    }

    pub fn fetcher(&self) -> &Arc<BalanceFetcher> {
        &self.fetcher
    }

    /// Run one full refresh for `account`.
    ///
    /// The loading indicator is raised once and cleared exactly once. A failed
    /// native fetch aborts the pass and is returned; token failures only ever
    /// affect their own slot.
    pub async fn refresh(&self, account: &str) -> Result<()> {
        let _loading = LoadingGuard::start(self.renderer.as_ref());
        debug!("refreshing balances for {account}");

        let native = match self.fetcher.fetch_native(account).await {
            Ok(native) => native,
            Err(e) => {
                warn!("native balance fetch failed: {e:#}");
                self.renderer.render(
                    Slot::Native,
                    format!("{NATIVE_SYMBOL} Balance: unavailable"),
                );
                return Err(WatchError::Network(format!(
                    "Failed to fetch {NATIVE_SYMBOL} balance: {e:#}"
                )));
            }
        };
        self.renderer
            .render(Slot::Native, display::format_balance_line(&native));

        let tokens = self.registry.read().await.snapshot();
        self.refresh_primary(account, tokens.first()).await;
        self.refresh_tokens(account, tokens).await;
        Ok(())
    }

    /// Render the primary slot from the first registry entry, or its
    /// placeholder when the registry is empty.
    pub async fn refresh_primary(&self, account: &str, primary: Option<&TokenDescriptor>) {
        let text = match primary {
            Some(token) => {
                let result = self.fetcher.fetch_token(account, token).await;
                display::format_balance_line(&result)
            }
            None => Slot::Primary.placeholder(),
        };
        self.renderer.render(Slot::Primary, text);
    }

    /// Fetch and render one token slot.
    pub async fn refresh_token(&self, account: &str, token: &TokenDescriptor) {
        let result = self.fetcher.fetch_token(account, token).await;
        self.renderer.render(
            Slot::token(&token.address),
            display::format_token_line(&token.note, &result),
        );
    }

    /// Fetch every token concurrently. Each task renders its own slot; a task
    /// that dies is logged and its slot marked unavailable.
    async fn refresh_tokens(&self, account: &str, tokens: Vec<TokenDescriptor>) {
        let mut addresses = Vec::with_capacity(tokens.len());
        let mut handles = Vec::with_capacity(tokens.len());
        for token in tokens {
            addresses.push(token.clone());
            let fetcher = self.fetcher.clone();
            let renderer = self.renderer.clone();
            let account = account.to_string();
            handles.push(tokio::spawn(async move {
                let result = fetcher.fetch_token(&account, &token).await;
                renderer.render(
                    Slot::token(&token.address),
                    display::format_token_line(&token.note, &result),
                );
            }));
        }

        let outcomes = futures::future::join_all(handles).await;
        for (token, outcome) in addresses.iter().zip(outcomes) {
            if let Err(e) = outcome {
                warn!("balance task for {} failed: {e}", token.address);
                let label = if token.note.is_empty() {
                    display::short_address(&token.address)
                } else {
                    token.note.clone()
                };
                self.renderer
                    .render(Slot::token(&token.address), format!("{label}: unavailable"));
            }
        }
    }
}

/// Periodic refresh timer. At most one is armed; arming again replaces it.
#[derive(Default)]
pub struct AutoRefresh {
    handle: Option<JoinHandle<()>>,
    interval: Option<Duration>,
}

impl AutoRefresh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer. The first tick fires one full `interval` from now.
    /// Each tick refreshes whatever account `context` holds at that moment.
    pub fn set(
        &mut self,
        interval: Duration,
        orchestrator: Arc<RefreshOrchestrator>,
        context: Arc<RwLock<SessionContext>>,
    ) {
        self.cancel();
        info!("auto-refresh every {}s", interval.as_secs());

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let account = context.read().await.account.clone();
                let Some(account) = account else {
                    debug!("auto-refresh tick without an account");
                    continue;
                };
                // Detached so cancelling the timer leaves an in-flight pass alone.
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move {
                    if let Err(e) = orchestrator.refresh(&account).await {
                        warn!("auto-refresh failed: {e}");
                    }
                });
            }
        });
        self.handle = Some(handle);
        self.interval = Some(interval);
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("auto-refresh cancelled");
        }
        self.interval = None;
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        self.cancel();
    }
}
