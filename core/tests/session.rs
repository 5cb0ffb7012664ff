/// Session lifecycle tests against in-memory wallet, chain and price fakes.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ethers::abi::{Abi, Token};
use ethers::types::{Address, U256};
use tokio::sync::mpsc::UnboundedSender;

use walletwatch_core::registry::DEFAULT_TOKEN_ADDRESS;
use walletwatch_core::render::{NetworkWarning, Renderer, Slot, SlotBoard};
use walletwatch_core::{
    BalanceFetcher, ChainReader, ConnectionState, EventKind, MemoryTokenStore, PriceOracle,
    PriceSource, ProviderError, ProviderEvent, RawChainId, Session, SubscriptionId,
    TokenDescriptor, TokenRegistry, WalletProvider, WatchError,
};

const ALICE: &str = "0x1111111111111111111111111111111111111111";
const BOB: &str = "0x2222222222222222222222222222222222222222";
const DAI: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";
const BROKEN: &str = "0x3333333333333333333333333333333333333333";

struct FakeWallet {
    request: Mutex<Result<Vec<String>, ProviderError>>,
    current: Mutex<Vec<String>>,
    chain: Mutex<RawChainId>,
    subs: Mutex<HashMap<u64, (EventKind, UnboundedSender<ProviderEvent>)>>,
    next_id: AtomicU64,
    subscribe_calls: AtomicUsize,
    switch_requests: Mutex<Vec<String>>,
    unsubscribe_unsupported: bool,
}

impl FakeWallet {
    fn new(accounts: Result<Vec<String>, ProviderError>) -> Self {
        Self {
            request: Mutex::new(accounts),
            current: Mutex::new(Vec::new()),
            chain: Mutex::new(RawChainId::Text("0x1".into())),
            subs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            subscribe_calls: AtomicUsize::new(0),
            switch_requests: Mutex::new(Vec::new()),
            unsubscribe_unsupported: false,
        }
    }

    fn with_account(account: &str) -> Self {
        Self::new(Ok(vec![account.to_string()]))
    }

    fn active_subscriptions(&self) -> usize {
        self.subs.lock().unwrap().len()
    }

    /// Deliver an event the way a provider would.
    fn emit(&self, event: ProviderEvent) {
        let kind = event.kind();
        for (k, tx) in self.subs.lock().unwrap().values() {
            if *k == kind {
                let _ = tx.send(event.clone());
            }
        }
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn request_accounts(&self) -> Result<Vec<String>, ProviderError> {
        self.request.lock().unwrap().clone()
    }

    async fn current_accounts(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn chain_id(&self) -> Result<RawChainId, ProviderError> {
        Ok(self.chain.lock().unwrap().clone())
    }

    async fn request_chain_switch(&self, chain_id_hex: &str) -> Result<(), ProviderError> {
        self.switch_requests
            .lock()
            .unwrap()
            .push(chain_id_hex.to_string());
        Ok(())
    }

    fn subscribe(
        &self,
        kind: EventKind,
        sender: UnboundedSender<ProviderEvent>,
    ) -> Result<SubscriptionId, ProviderError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subs.lock().unwrap().insert(id, (kind, sender));
        Ok(SubscriptionId(id))
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), ProviderError> {
        self.subs.lock().unwrap().remove(&id.0);
        if self.unsubscribe_unsupported {
            return Err(ProviderError::Unsupported("removeListener".into()));
        }
        Ok(())
    }
}

struct FakeChain {
    native: Mutex<Option<U256>>,
    native_calls: AtomicUsize,
    /// contract -> (decimals, symbol, balance)
    tokens: HashMap<Address, (u8, &'static str, U256)>,
}

impl FakeChain {
    fn new(native_wei: Option<U256>) -> Self {
        let mut tokens = HashMap::new();
        tokens.insert(
            DEFAULT_TOKEN_ADDRESS.parse().unwrap(),
            (6, "USDT", U256::from(1_000_000u64)),
        );
        tokens.insert(DAI.parse().unwrap(), (18, "DAI", U256::from(5u64) * U256::exp10(18)));
        Self {
            native: Mutex::new(native_wei),
            native_calls: AtomicUsize::new(0),
            tokens,
        }
    }

    fn calls(&self) -> usize {
        self.native_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn native_balance(&self, _address: Address) -> anyhow::Result<U256> {
        self.native_calls.fetch_add(1, Ordering::SeqCst);
        self.native
            .lock()
            .unwrap()
            .ok_or_else(|| anyhow::anyhow!("connection reset"))
    }

    async fn call_method(
        &self,
        contract: Address,
        _abi: &Abi,
        method: &str,
        _args: Vec<Token>,
    ) -> anyhow::Result<Vec<Token>> {
        let (decimals, symbol, balance) = self
            .tokens
            .get(&contract)
            .ok_or_else(|| anyhow::anyhow!("execution reverted"))?;
        Ok(match method {
            "decimals" => vec![Token::Uint(U256::from(*decimals))],
            "symbol" => vec![Token::String(symbol.to_string())],
            "balanceOf" => vec![Token::Uint(*balance)],
            other => anyhow::bail!("unexpected method {other}"),
        })
    }
}

struct FixedPrices(HashMap<&'static str, f64>);

#[async_trait]
impl PriceSource for FixedPrices {
    async fn usd_price(&self, feed_id: &str) -> anyhow::Result<Option<f64>> {
        Ok(self.0.get(feed_id).copied())
    }
}

/// Slot board that also records every loading transition.
struct RecordingBoard {
    board: SlotBoard,
    loading: Mutex<Vec<bool>>,
}

impl Default for RecordingBoard {
    fn default() -> Self {
        Self {
            board: SlotBoard::new(),
            loading: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingBoard {
    fn text(&self, slot: &Slot) -> Option<String> {
        self.board.text(slot)
    }

    fn loading_transitions(&self) -> Vec<bool> {
        self.loading.lock().unwrap().clone()
    }
}

impl Renderer for RecordingBoard {
    fn render(&self, slot: Slot, text: String) {
        self.board.render(slot, text);
    }
    fn set_network_label(&self, label: String) {
        self.board.set_network_label(label);
    }
    fn set_network_warning(&self, warning: Option<NetworkWarning>) {
        self.board.set_network_warning(warning);
    }
    fn set_loading(&self, loading: bool) {
        self.loading.lock().unwrap().push(loading);
        self.board.set_loading(loading);
    }
    fn clear(&self, slot: &Slot) {
        self.board.clear(slot);
    }
    fn reset(&self, placeholders: &[(Slot, String)]) {
        self.board.reset(placeholders);
    }
}

struct Harness {
    session: Session,
    wallet: Arc<FakeWallet>,
    chain: Arc<FakeChain>,
    board: Arc<RecordingBoard>,
}

fn harness_with(wallet: FakeWallet, chain: FakeChain, tokens: Vec<TokenDescriptor>) -> Harness {
    let wallet = Arc::new(wallet);
    let chain = Arc::new(chain);
    let board = Arc::new(RecordingBoard::default());
    let prices = Arc::new(PriceOracle::new(Arc::new(FixedPrices(HashMap::from([
        ("ethereum", 2000.0),
        ("tether", 1.0),
    ])))));
    let fetcher = BalanceFetcher::new(chain.clone(), prices).unwrap();
    let store = if tokens.is_empty() {
        MemoryTokenStore::default()
    } else {
        MemoryTokenStore::with_tokens(tokens)
    };
    let registry = TokenRegistry::load(Box::new(store));
    let session = Session::new(wallet.clone(), fetcher, registry, board.clone());
    Harness {
        session,
        wallet,
        chain,
        board,
    }
}

fn harness(wallet: FakeWallet) -> Harness {
    harness_with(wallet, FakeChain::new(Some(U256::exp10(18))), Vec::new())
}

#[tokio::test]
async fn connect_renders_account_network_and_balances() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    let account = h.session.connect().await.unwrap();
    assert_eq!(account, ALICE);
    assert_eq!(h.session.state().await, ConnectionState::Connected(ALICE.into()));

    assert_eq!(
        h.board.text(&Slot::Account),
        Some(format!("Connected: {ALICE}"))
    );
    assert_eq!(
        h.board.board.snapshot().network_label,
        "Ethereum Mainnet (chain 1)"
    );
    assert_eq!(
        h.board.text(&Slot::Native).as_deref(),
        Some("ETH Balance: 1.0000 ETH ($2000.00)")
    );
    assert_eq!(
        h.board.text(&Slot::Primary).as_deref(),
        Some("USDT Balance: 1.0000 USDT ($1.00)")
    );
    assert_eq!(h.board.loading_transitions(), vec![true, false]);
}

#[tokio::test]
async fn unfunded_account_with_one_usdt() {
    let mut h = harness_with(
        FakeWallet::with_account(ALICE),
        FakeChain::new(Some(U256::zero())),
        Vec::new(),
    );
    h.session.connect().await.unwrap();
    assert_eq!(
        h.board.text(&Slot::Native).as_deref(),
        Some("ETH Balance: 0.0000 ETH ($0.00)")
    );
    assert_eq!(
        h.board.text(&Slot::token(DEFAULT_TOKEN_ADDRESS)).as_deref(),
        Some("USDT Balance: 1.0000 USDT ($1.00)")
    );
}

#[tokio::test]
async fn rejected_connect_stays_disconnected() {
    let mut h = harness(FakeWallet::new(Err(ProviderError::Rejected(
        "User rejected the request.".into(),
    ))));
    let err = h.session.connect().await.unwrap_err();
    assert!(matches!(err, WatchError::UserRejected(_)));
    assert_eq!(h.session.state().await, ConnectionState::Disconnected);
    assert_eq!(
        h.board.text(&Slot::Account).as_deref(),
        Some("Failed to connect wallet")
    );
    assert_eq!(h.wallet.active_subscriptions(), 0);
    assert_eq!(h.chain.calls(), 0);
}

#[tokio::test]
async fn missing_provider_is_blocking() {
    let mut h = harness(FakeWallet::new(Err(ProviderError::Unavailable(
        "connection refused".into(),
    ))));
    let err = h.session.connect().await.unwrap_err();
    assert!(matches!(err, WatchError::ProviderUnavailable));
    assert_eq!(h.chain.calls(), 0);
}

#[tokio::test]
async fn empty_account_list_is_an_error() {
    let mut h = harness(FakeWallet::new(Ok(Vec::new())));
    let err = h.session.connect().await.unwrap_err();
    assert!(matches!(err, WatchError::NoAccounts));
    assert_eq!(h.session.state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn native_failure_still_ends_loading_once() {
    let mut h = harness_with(
        FakeWallet::with_account(ALICE),
        FakeChain::new(None),
        Vec::new(),
    );
    // The connection itself succeeds; the failed pass is logged.
    h.session.connect().await.unwrap();
    assert_eq!(h.board.loading_transitions(), vec![true, false]);
    assert_eq!(
        h.board.text(&Slot::Native).as_deref(),
        Some("ETH Balance: unavailable")
    );

    assert!(h.session.refresh().await.is_err());
    assert_eq!(h.board.loading_transitions(), vec![true, false, true, false]);
}

#[tokio::test]
async fn failing_token_does_not_block_others() {
    let mut h = harness_with(
        FakeWallet::with_account(ALICE),
        FakeChain::new(Some(U256::zero())),
        vec![
            TokenDescriptor::new(BROKEN, "Mystery").unwrap(),
            TokenDescriptor::new(DAI, "").unwrap(),
        ],
    );
    h.session.connect().await.unwrap();
    assert_eq!(
        h.board.text(&Slot::token(BROKEN)).as_deref(),
        Some("Mystery Balance: 0.0000 Mystery")
    );
    assert_eq!(
        h.board.text(&Slot::token(DAI)).as_deref(),
        Some("DAI Balance: 5.0000 DAI")
    );
}

#[tokio::test]
async fn token_lines_keep_registry_order() {
    let mut h = harness_with(
        FakeWallet::with_account(ALICE),
        FakeChain::new(Some(U256::exp10(18))),
        vec![
            TokenDescriptor::new(DAI, "").unwrap(),
            TokenDescriptor::new(BROKEN, "mystery").unwrap(),
        ],
    );
    h.session.connect().await.unwrap();

    let lines = h.board.board.lines();
    assert_eq!(
        &lines[lines.len() - 3..],
        [
            "DAI Balance: 5.0000 DAI",
            "  DAI Balance: 5.0000 DAI",
            "  mystery Balance: 0.0000 mystery",
        ]
    );
}

#[tokio::test]
async fn handlers_register_once() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    h.session.connect().await.unwrap();
    h.session.connect().await.unwrap();
    assert_eq!(h.wallet.subscribe_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.wallet.active_subscriptions(), 2);

    h.session.disconnect().await;
    assert_eq!(h.wallet.active_subscriptions(), 0);
    h.session.connect().await.unwrap();
    assert_eq!(h.wallet.active_subscriptions(), 2);
}

#[tokio::test]
async fn empty_accounts_event_disconnects() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    h.session.connect().await.unwrap();
    h.session.set_auto_refresh(Some(Duration::from_secs(30)));
    assert!(h.session.auto_refresh().is_some());

    h.session
        .handle_event(ProviderEvent::AccountsChanged(Vec::new()))
        .await;

    assert_eq!(h.session.state().await, ConnectionState::Disconnected);
    assert!(h.session.auto_refresh().is_none());
    assert_eq!(h.wallet.active_subscriptions(), 0);
    assert_eq!(h.board.text(&Slot::Account).as_deref(), Some("Not connected"));
    assert_eq!(h.board.text(&Slot::Native).as_deref(), Some("ETH Balance: --"));
    assert_eq!(
        h.board.text(&Slot::token(DEFAULT_TOKEN_ADDRESS)).as_deref(),
        Some("USDT: --")
    );
    assert_eq!(h.board.board.snapshot().network_label, "Not connected");
}

#[tokio::test]
async fn account_switch_refreshes_new_account() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    h.session.connect().await.unwrap();
    let before = h.chain.calls();

    h.session
        .handle_event(ProviderEvent::AccountsChanged(vec![BOB.into()]))
        .await;
    assert_eq!(h.session.account().await.as_deref(), Some(BOB));
    assert_eq!(h.board.text(&Slot::Account), Some(format!("Connected: {BOB}")));
    assert_eq!(h.chain.calls(), before + 1);
}

#[tokio::test]
async fn chain_change_updates_warning_and_refreshes() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    h.session.connect().await.unwrap();
    let before = h.chain.calls();

    h.session
        .handle_event(ProviderEvent::ChainChanged(RawChainId::Text("0x89".into())))
        .await;
    let state = h.board.board.snapshot();
    assert_eq!(state.network_label, "Polygon (chain 137)");
    assert_eq!(state.warning, Some(NetworkWarning::SwitchToMainnet));
    assert_eq!(h.chain.calls(), before + 1);

    h.session.switch_to_mainnet().await.unwrap();
    assert_eq!(*h.wallet.switch_requests.lock().unwrap(), vec!["0x1".to_string()]);

    h.session
        .handle_event(ProviderEvent::ChainChanged(RawChainId::Number(1)))
        .await;
    assert_eq!(h.board.board.snapshot().warning, None);
    assert_eq!(h.chain.calls(), before + 2);
}

#[tokio::test]
async fn malformed_chain_id_keeps_previous_network() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    h.session.connect().await.unwrap();
    h.session
        .handle_event(ProviderEvent::ChainChanged(RawChainId::Text("banana".into())))
        .await;
    assert_eq!(
        h.board.board.snapshot().network_label,
        "Ethereum Mainnet (chain 1)"
    );
    assert_eq!(h.session.status().await.chain.map(|c| c.chain_id.0), Some(1));
}

#[tokio::test]
async fn events_flow_through_the_channel() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    let mut events = h.session.take_events().unwrap();
    assert!(h.session.take_events().is_none());
    h.session.connect().await.unwrap();

    h.wallet
        .emit(ProviderEvent::AccountsChanged(vec![BOB.to_string()]));
    let event = events.recv().await.unwrap();
    assert_eq!(event.kind(), EventKind::AccountsChanged);
    h.session.handle_event(event).await;
    assert_eq!(h.session.account().await.as_deref(), Some(BOB));
}

#[tokio::test]
async fn events_after_disconnect_are_ignored() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    h.session.connect().await.unwrap();
    h.session.disconnect().await;
    let before = h.chain.calls();

    h.session
        .handle_event(ProviderEvent::AccountsChanged(vec![BOB.into()]))
        .await;
    assert_eq!(h.session.state().await, ConnectionState::Disconnected);
    assert_eq!(h.chain.calls(), before);
}

#[tokio::test]
async fn unsupported_unsubscribe_is_tolerated() {
    let mut wallet = FakeWallet::with_account(ALICE);
    wallet.unsubscribe_unsupported = true;
    let mut h = harness(wallet);
    h.session.connect().await.unwrap();
    h.session.disconnect().await;
    assert!(!h.session.is_subscribed());
    assert_eq!(h.session.state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn probe_without_authorization_stays_silent() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    assert_eq!(h.session.probe().await, None);
    assert_eq!(h.session.state().await, ConnectionState::Disconnected);
    assert_eq!(h.board.text(&Slot::Account).as_deref(), Some("Not connected"));
}

#[tokio::test]
async fn probe_reuses_authorized_account() {
    let wallet = FakeWallet::with_account(ALICE);
    *wallet.current.lock().unwrap() = vec![BOB.to_string()];
    let mut h = harness(wallet);
    assert_eq!(h.session.probe().await.as_deref(), Some(BOB));
    assert_eq!(h.chain.calls(), 1);
}

#[tokio::test]
async fn toggle_flips_connection() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    assert_eq!(h.session.toggle().await.unwrap().as_deref(), Some(ALICE));
    assert_eq!(h.session.toggle().await.unwrap(), None);
    assert_eq!(h.session.state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn refresh_requires_connection() {
    let h = harness(FakeWallet::with_account(ALICE));
    assert!(matches!(
        h.session.refresh().await,
        Err(WatchError::NotConnected)
    ));
}

#[tokio::test(start_paused = true)]
async fn changing_interval_replaces_timer() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    h.session.connect().await.unwrap();
    let base = h.chain.calls();

    h.session.set_auto_refresh(Some(Duration::from_secs(30)));
    tokio::time::sleep(Duration::from_secs(10)).await;
    h.session.set_auto_refresh(Some(Duration::from_secs(60)));

    // The 30s timer would have fired twice by now.
    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(h.chain.calls(), base);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.chain.calls(), base + 1);

    h.session.set_auto_refresh(None);
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(h.chain.calls(), base + 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_stops_pending_ticks() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    h.session.connect().await.unwrap();
    h.session.set_auto_refresh(Some(Duration::from_secs(30)));
    let base = h.chain.calls();

    h.session.disconnect().await;
    tokio::time::sleep(Duration::from_secs(95)).await;
    assert_eq!(h.chain.calls(), base);
}

#[tokio::test(start_paused = true)]
async fn zero_interval_cancels() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    h.session.connect().await.unwrap();
    h.session.set_auto_refresh(Some(Duration::from_secs(5)));
    h.session.set_auto_refresh(Some(Duration::ZERO));
    assert!(h.session.auto_refresh().is_none());
}

#[tokio::test]
async fn add_and_remove_tokens() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    h.session.connect().await.unwrap();

    let dai = h.session.add_token(DAI, "savings").await.unwrap();
    assert_eq!(dai.note, "savings");
    assert_eq!(
        h.board.text(&Slot::token(DAI)).as_deref(),
        Some("[savings] DAI Balance: 5.0000 DAI")
    );
    assert_eq!(h.session.tokens().await.len(), 2);

    let dup = h.session.add_token(&DAI.to_lowercase(), "again").await;
    assert!(matches!(dup, Err(WatchError::DuplicateToken(_))));

    h.session.remove_token(DAI).await.unwrap();
    assert!(h.board.text(&Slot::token(DAI)).is_none());
    assert_eq!(h.session.status().await.token_count, 1);
}

#[tokio::test]
async fn add_token_while_disconnected_shows_placeholder() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    h.session.add_token(DAI, "").await.unwrap();
    assert_eq!(
        h.board.text(&Slot::token(DAI)).as_deref(),
        Some("0x6B17...1d0F: --")
    );
    assert_eq!(h.chain.calls(), 0);
}

#[tokio::test]
async fn removing_first_token_moves_primary_on() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    h.session.connect().await.unwrap();
    h.session.add_token(DAI, "").await.unwrap();

    h.session.remove_token(DEFAULT_TOKEN_ADDRESS).await.unwrap();
    assert_eq!(
        h.board.text(&Slot::Primary).as_deref(),
        Some("DAI Balance: 5.0000 DAI")
    );

    h.session.remove_token(DAI).await.unwrap();
    assert_eq!(h.board.text(&Slot::Primary).as_deref(), Some("Token Balance: --"));
    h.session.refresh().await.unwrap();
    assert_eq!(h.board.text(&Slot::Primary).as_deref(), Some("Token Balance: --"));
}

#[tokio::test]
async fn removing_other_tokens_leaves_primary_alone() {
    let mut h = harness(FakeWallet::with_account(ALICE));
    h.session.connect().await.unwrap();
    h.session.add_token(DAI, "").await.unwrap();
    let base = h.chain.calls();

    h.session.remove_token(DAI).await.unwrap();
    assert_eq!(
        h.board.text(&Slot::Primary).as_deref(),
        Some("USDT Balance: 1.0000 USDT ($1.00)")
    );
    assert_eq!(h.chain.calls(), base);
}

#[tokio::test]
async fn removing_first_token_while_disconnected_shows_placeholder() {
    let mut h = harness_with(
        FakeWallet::with_account(ALICE),
        FakeChain::new(Some(U256::exp10(18))),
        vec![
            TokenDescriptor::new(DAI, "").unwrap(),
            TokenDescriptor::new(BROKEN, "mystery").unwrap(),
        ],
    );
    h.session.remove_token(DAI).await.unwrap();
    assert_eq!(h.board.text(&Slot::Primary).as_deref(), Some("Token Balance: --"));
    assert_eq!(h.chain.calls(), 0);
}
