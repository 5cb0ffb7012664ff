//! Native and ERC-20 balance retrieval.
//!
//! Token fetches tolerate partially implemented contracts: each of the three
//! metadata/balance calls resolves to a [`CallOutcome`], substituting a default
//! when the call fails, so `fetch_token` never errors.

use std::sync::Arc;

use anyhow::{Context, Result};
use ethers::abi::{Abi, Token};
use ethers::types::{Address, U256};
use serde::Serialize;
use tracing::debug;

use crate::display;
use crate::price::{feed_id_for_symbol, PriceOracle, NATIVE_FEED_ID};
use crate::provider::ChainReader;
use crate::registry::TokenDescriptor;

pub const DEFAULT_DECIMALS: u8 = 18;

const ERC20_ABI: &[&str] = &[
    "function balanceOf(address owner) view returns (uint256)",
    "function decimals() view returns (uint8)",
    "function symbol() view returns (string)",
];

pub fn erc20_abi() -> Result<Abi> {
    ethers::abi::parse_abi(ERC20_ABI).context("Failed to parse ERC-20 ABI")
}

/// Outcome of a single best-effort call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    Value(T),
    Fallback(T),
}

impl<T> CallOutcome<T> {
    fn resolve(result: Result<T>, what: &str, fallback: impl FnOnce() -> T) -> Self {
        match result {
            Ok(v) => CallOutcome::Value(v),
            Err(e) => {
                debug!("{what} failed, using default: {e:#}");
                CallOutcome::Fallback(fallback())
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, CallOutcome::Fallback(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            CallOutcome::Value(v) | CallOutcome::Fallback(v) => v,
        }
    }
}

/// Balance of one watched entity, built fresh per fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceResult {
    pub symbol: String,
    pub decimals: u8,
    /// Raw integer amount as a decimal string; `None` if the balance call failed.
    pub raw_amount: Option<String>,
    pub formatted_amount: f64,
    pub usd_value: Option<f64>,
}

pub struct BalanceFetcher {
    reader: Arc<dyn ChainReader>,
    prices: Arc<PriceOracle>,
    erc20: Abi,
}

impl BalanceFetcher {
    pub fn new(reader: Arc<dyn ChainReader>, prices: Arc<PriceOracle>) -> Result<Self> {
        Ok(Self {
            reader,
            prices,
            erc20: erc20_abi()?,
        })
    }

    pub fn prices(&self) -> &Arc<PriceOracle> {
        &self.prices
    }

    /// Native coin balance with a best-effort fiat value.
    pub async fn fetch_native(&self, account: &str) -> Result<BalanceResult> {
        let address: Address = account
            .parse()
            .with_context(|| format!("Invalid account address '{account}'"))?;
        let wei = self
            .reader
            .native_balance(address)
            .await
            .context("Failed to query native balance")?;

        let amount = display::wei_to_ether(wei);
        let usd_value = self.prices.usd_price(NATIVE_FEED_ID).await.map(|p| p * amount);

        Ok(BalanceResult {
            symbol: display::NATIVE_SYMBOL.to_string(),
            decimals: DEFAULT_DECIMALS,
            raw_amount: Some(wei.to_string()),
            formatted_amount: amount,
            usd_value,
        })
    }

    /// ERC-20 balance. Never fails; see [`CallOutcome`].
    pub async fn fetch_token(&self, account: &str, token: &TokenDescriptor) -> BalanceResult {
        let (decimals, symbol, balance) = futures::join!(
            self.call_decimals(token),
            self.call_symbol(token),
            self.call_balance_of(account, token),
        );

        let decimals = decimals.into_inner();
        let symbol = symbol.into_inner();
        let raw_amount = match &balance {
            CallOutcome::Value(raw) => Some(raw.to_string()),
            CallOutcome::Fallback(_) => None,
        };
        let amount = display::scale_amount(balance.into_inner(), decimals);

        let usd_value = match feed_id_for_symbol(&symbol) {
            Some(feed) => self.prices.usd_price(feed).await.map(|p| p * amount),
            None => None,
        };

        BalanceResult {
            symbol,
            decimals,
            raw_amount,
            formatted_amount: amount,
            usd_value,
        }
    }

    async fn call_decimals(&self, token: &TokenDescriptor) -> CallOutcome<u8> {
        let result: Result<u8> = async {
            let out = self.call(token, "decimals", vec![]).await?;
            match out.into_iter().next() {
                Some(Token::Uint(v)) if v <= U256::from(u8::MAX) => Ok(v.low_u32() as u8),
                Some(Token::Uint(v)) => anyhow::bail!("decimals out of range: {v}"),
                other => anyhow::bail!("unexpected decimals output: {other:?}"),
            }
        }
        .await;
        CallOutcome::resolve(result, "decimals()", || DEFAULT_DECIMALS)
    }

    async fn call_symbol(&self, token: &TokenDescriptor) -> CallOutcome<String> {
        let result: Result<String> = async {
            let out = self.call(token, "symbol", vec![]).await?;
            let symbol = match out.into_iter().next() {
                Some(Token::String(s)) => s,
                Some(Token::FixedBytes(bytes)) => {
                    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
                    String::from_utf8(bytes[..end].to_vec()).context("symbol is not UTF-8")?
                }
                other => anyhow::bail!("unexpected symbol output: {other:?}"),
            };
            let symbol = symbol.trim().to_string();
            if symbol.is_empty() {
                anyhow::bail!("empty symbol");
            }
            Ok(symbol)
        }
        .await;
        CallOutcome::resolve(result, "symbol()", || fallback_symbol(token))
    }

    async fn call_balance_of(&self, account: &str, token: &TokenDescriptor) -> CallOutcome<U256> {
        let result: Result<U256> = async {
            let owner: Address = account
                .parse()
                .with_context(|| format!("Invalid account address '{account}'"))?;
            let out = self.call(token, "balanceOf", vec![Token::Address(owner)]).await?;
            match out.into_iter().next() {
                Some(Token::Uint(v)) => Ok(v),
                other => anyhow::bail!("unexpected balanceOf output: {other:?}"),
            }
        }
        .await;
        CallOutcome::resolve(result, "balanceOf()", U256::zero)
    }

    async fn call(
        &self,
        token: &TokenDescriptor,
        method: &str,
        args: Vec<Token>,
    ) -> Result<Vec<Token>> {
        let contract: Address = token
            .address
            .parse()
            .with_context(|| format!("Invalid token address '{}'", token.address))?;
        self.reader.call_method(contract, &self.erc20, method, args).await
    }
}

/// Symbol used when the contract does not report one: the note, else the
/// shortened address.
fn fallback_symbol(token: &TokenDescriptor) -> String {
    if token.note.trim().is_empty() {
        display::short_address(&token.address)
    } else {
        token.note.trim().to_string()
    }
}
