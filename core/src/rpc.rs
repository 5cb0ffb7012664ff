/// JSON-RPC adapter over an ethers HTTP provider: chain reads, wallet
/// requests and a polling event source.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::abi::{Abi, Token};
use ethers::providers::{Http, Middleware, Provider, ProviderError as EthersError, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, U256};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::chain::RawChainId;
use crate::provider::{
    ChainReader, EventKind, ProviderError, ProviderEvent, SubscriptionId, WalletProvider,
};

/// EIP-1193 "user rejected request".
const CODE_USER_REJECTED: i64 = 4001;
/// JSON-RPC "method not found".
const CODE_METHOD_NOT_FOUND: i64 = -32601;

type Subscribers = Arc<Mutex<HashMap<u64, (EventKind, UnboundedSender<ProviderEvent>)>>>;

/// Reject non-HTTPS RPC URLs unless `allow_insecure` is set.
pub fn validate_rpc_url(url: &str, allow_insecure: bool) -> Result<()> {
    if url.starts_with("https://") {
        return Ok(());
    }
    if url.starts_with("http://") {
        if allow_insecure {
            return Ok(());
        }
        anyhow::bail!(
            "Refusing to connect over plain HTTP: {url}\nUse --insecure to allow unencrypted connections."
        );
    }
    anyhow::bail!("Invalid RPC URL scheme: {url}\nExpected an https:// URL.");
}

pub struct EthRpc {
    provider: Provider<Http>,
    rpc_url: String,
    watch_address: Option<Address>,
    poll_interval: Duration,
    subscribers: Subscribers,
    next_id: AtomicU64,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl EthRpc {
    pub fn new(url: &str, timeout: Duration, allow_insecure: bool) -> Result<Self> {
        validate_rpc_url(url, allow_insecure)?;
        let parsed = reqwest::Url::parse(url).with_context(|| format!("Invalid RPC URL: {url}"))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let provider = Provider::new(Http::new_with_client(parsed, client));
        Ok(Self {
            provider,
            rpc_url: url.to_string(),
            watch_address: None,
            poll_interval: Duration::from_secs(4),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            poller: Mutex::new(None),
        })
    }

    /// Report `address` as the wallet's only account instead of asking the node.
    pub fn with_watch_address(mut self, address: Option<Address>) -> Self {
        self.watch_address = address;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    fn lock_poller(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.poller.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn start_poller(&self) {
        let mut poller = self.lock_poller();
        if poller.is_some() {
            return;
        }
        debug!("starting event poller ({}s)", self.poll_interval.as_secs());
        let provider = self.provider.clone();
        let watch = self.watch_address;
        let subscribers = self.subscribers.clone();
        let interval = self.poll_interval;
        *poller = Some(tokio::spawn(poll_events(provider, watch, subscribers, interval)));
    }

    fn stop_poller(&self) {
        if let Some(handle) = self.lock_poller().take() {
            debug!("stopping event poller");
            handle.abort();
        }
    }
}

impl Drop for EthRpc {
    fn drop(&mut self) {
        self.stop_poller();
    }
}

fn classify(err: EthersError) -> ProviderError {
    if let Some(resp) = err.as_error_response() {
        return match resp.code {
            CODE_USER_REJECTED => ProviderError::Rejected(resp.message.clone()),
            CODE_METHOD_NOT_FOUND => ProviderError::Unsupported(resp.message.clone()),
            _ => ProviderError::Rpc(resp.message.clone()),
        };
    }
    if err.as_serde_error().is_some() {
        return ProviderError::Rpc(err.to_string());
    }
    ProviderError::Unavailable(err.to_string())
}

async fn fetch_accounts(
    provider: &Provider<Http>,
    watch: Option<Address>,
    method: &str,
) -> Result<Vec<String>, ProviderError> {
    if let Some(address) = watch {
        return Ok(vec![ethers::utils::to_checksum(&address, None)]);
    }
    provider
        .request::<_, Vec<String>>(method, ())
        .await
        .map_err(classify)
}

async fn fetch_chain_id(provider: &Provider<Http>) -> Result<RawChainId, ProviderError> {
    provider
        .request::<_, RawChainId>("eth_chainId", ())
        .await
        .map_err(classify)
}

/// Poll accounts and chain id, pushing changes to subscribers. The first
/// round only records the baseline.
async fn poll_events(
    provider: Provider<Http>,
    watch: Option<Address>,
    subscribers: Subscribers,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    let mut last_accounts: Option<Vec<String>> = None;
    let mut last_chain: Option<RawChainId> = None;
    loop {
        ticker.tick().await;

        match fetch_accounts(&provider, watch, "eth_accounts").await {
            Ok(accounts) => {
                if last_accounts.as_ref().is_some_and(|prev| *prev != accounts) {
                    publish(&subscribers, ProviderEvent::AccountsChanged(accounts.clone()));
                }
                last_accounts = Some(accounts);
            }
            Err(e) => debug!("account poll failed: {e}"),
        }

        match fetch_chain_id(&provider).await {
            Ok(chain) => {
                if last_chain.as_ref().is_some_and(|prev| *prev != chain) {
                    publish(&subscribers, ProviderEvent::ChainChanged(chain.clone()));
                }
                last_chain = Some(chain);
            }
            Err(e) => debug!("chain poll failed: {e}"),
        }
    }
}

fn publish(subscribers: &Subscribers, event: ProviderEvent) {
    let kind = event.kind();
    let mut subs = subscribers.lock().unwrap_or_else(|p| p.into_inner());
    subs.retain(|id, (k, tx)| {
        if *k != kind {
            return true;
        }
        let delivered = tx.send(event.clone()).is_ok();
        if !delivered {
            debug!("dropping closed subscriber {id}");
        }
        delivered
    });
}

#[async_trait]
impl WalletProvider for EthRpc {
    async fn request_accounts(&self) -> Result<Vec<String>, ProviderError> {
        fetch_accounts(&self.provider, self.watch_address, "eth_requestAccounts").await
    }

    async fn current_accounts(&self) -> Result<Vec<String>, ProviderError> {
        fetch_accounts(&self.provider, self.watch_address, "eth_accounts").await
    }

    async fn chain_id(&self) -> Result<RawChainId, ProviderError> {
        fetch_chain_id(&self.provider).await
    }

    async fn request_chain_switch(&self, chain_id_hex: &str) -> Result<(), ProviderError> {
        let params = serde_json::json!([{ "chainId": chain_id_hex }]);
        self.provider
            .request::<_, serde_json::Value>("wallet_switchEthereumChain", params)
            .await
            .map_err(classify)?;
        Ok(())
    }

    fn subscribe(
        &self,
        kind: EventKind,
        sender: UnboundedSender<ProviderEvent>,
    ) -> Result<SubscriptionId, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(id, (kind, sender));
        self.start_poller();
        Ok(SubscriptionId(id))
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), ProviderError> {
        let empty = {
            let mut subs = self.subscribers.lock().unwrap_or_else(|p| p.into_inner());
            subs.remove(&id.0);
            subs.is_empty()
        };
        if empty {
            self.stop_poller();
        }
        Ok(())
    }
}

#[async_trait]
impl ChainReader for EthRpc {
    async fn native_balance(&self, address: Address) -> Result<U256> {
        self.provider
            .get_balance(address, None)
            .await
            .with_context(|| format!("Failed to query balance of {address:?}"))
    }

    async fn call_method(
        &self,
        contract: Address,
        abi: &Abi,
        method: &str,
        args: Vec<Token>,
    ) -> Result<Vec<Token>> {
        let function = abi
            .function(method)
            .with_context(|| format!("ABI has no method {method}"))?;
        let data = function
            .encode_input(&args)
            .with_context(|| format!("Failed to encode {method} call"))?;
        let tx: TypedTransaction = TransactionRequest::new().to(contract).data(data).into();
        let output = self
            .provider
            .call(&tx, None)
            .await
            .with_context(|| format!("{method} call to {contract:?} failed"))?;
        if output.is_empty() {
            warn!("{method} on {contract:?} returned no data");
        }
        function
            .decode_output(&output)
            .with_context(|| format!("Failed to decode {method} output"))
    }
}
