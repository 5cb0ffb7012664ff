use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

/// Quotes younger than this are served from the cache.
pub const PRICE_TTL_MILLIS: u64 = 60_000;

/// Feed id of the chain's native coin.
pub const NATIVE_FEED_ID: &str = "ethereum";

pub const DEFAULT_PRICE_API: &str = "https://api.coingecko.com/api/v3";

const SYMBOL_FEEDS: &[(&str, &str)] = &[
    ("ETH", "ethereum"),
    ("WETH", "weth"),
    ("USDT", "tether"),
    ("USDC", "usd-coin"),
    ("DAI", "dai"),
    ("WBTC", "wrapped-bitcoin"),
    ("LINK", "chainlink"),
    ("UNI", "uniswap"),
];

/// Map a token symbol to its price feed id. Case-insensitive.
pub fn feed_id_for_symbol(symbol: &str) -> Option<&'static str> {
    let upper = symbol.trim().to_uppercase();
    SYMBOL_FEEDS
        .iter()
        .find(|(sym, _)| *sym == upper)
        .map(|(_, feed)| *feed)
}

pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceCacheEntry {
    pub price: f64,
    pub fetched_at_millis: u64,
}

/// Process-wide USD quote cache with lazy expiry.
///
/// Stale entries are ignored, never evicted. Concurrent misses for the same
/// feed are not deduplicated; the last `put` wins.
#[derive(Debug, Default)]
pub struct PriceCache {
    entries: DashMap<String, PriceCacheEntry>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached price for `feed_id` if it is younger than [`PRICE_TTL_MILLIS`] at `now_millis`.
    pub fn get(&self, feed_id: &str, now_millis: u64) -> Option<f64> {
        let entry = self.entries.get(feed_id)?;
        if now_millis.saturating_sub(entry.fetched_at_millis) < PRICE_TTL_MILLIS {
            Some(entry.price)
        } else {
            None
        }
    }

    pub fn put(&self, feed_id: &str, price: f64, now_millis: u64) {
        self.entries.insert(
            feed_id.to_string(),
            PriceCacheEntry {
                price,
                fetched_at_millis: now_millis,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Source of fiat quotes.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// USD price for a feed id. `Ok(None)` when the source has no quote.
    async fn usd_price(&self, feed_id: &str) -> Result<Option<f64>>;
}

/// CoinGecko `simple/price` client.
pub struct CoinGeckoClient {
    http: reqwest::Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("walletwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build price API client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn usd_price(&self, feed_id: &str) -> Result<Option<f64>> {
        let url = format!("{}/simple/price", self.base_url);
        let body: HashMap<String, HashMap<String, f64>> = self
            .http
            .get(&url)
            .query(&[("ids", feed_id), ("vs_currencies", "usd")])
            .send()
            .await
            .context("Price API request failed")?
            .error_for_status()
            .context("Price API returned an error status")?
            .json()
            .await
            .context("Failed to decode price API response")?;

        Ok(body.get(feed_id).and_then(|quotes| quotes.get("usd")).copied())
    }
}

/// Cache-first price lookup. Never fails: any source error is logged and
/// treated as "no quote".
pub struct PriceOracle {
    cache: Arc<PriceCache>,
    source: Arc<dyn PriceSource>,
}

impl PriceOracle {
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self::with_cache(source, Arc::new(PriceCache::new()))
    }

    pub fn with_cache(source: Arc<dyn PriceSource>, cache: Arc<PriceCache>) -> Self {
        Self { cache, source }
    }

    pub fn cache(&self) -> &Arc<PriceCache> {
        &self.cache
    }

    pub async fn usd_price(&self, feed_id: &str) -> Option<f64> {
        if let Some(price) = self.cache.get(feed_id, now_millis()) {
            debug!("price cache hit for {feed_id}: {price}");
            return Some(price);
        }

        match self.source.usd_price(feed_id).await {
            Ok(Some(price)) => {
                self.cache.put(feed_id, price, now_millis());
                Some(price)
            }
            Ok(None) => {
                debug!("no price quote for {feed_id}");
                None
            }
            Err(e) => {
                debug!("price lookup for {feed_id} failed: {e:#}");
                None
            }
        }
    }
}
