/// Output formatting: wei conversion, balance lines and address shortening.
///
/// Amounts are plain `f64`; large balances lose precision the same way the
/// browser widget's `Number` arithmetic does.
use ethers::types::U256;

use crate::fetcher::BalanceResult;

pub const NATIVE_SYMBOL: &str = "ETH";

/// Convert a wei amount to ether using fixed 18-decimal scaling.
#[must_use]
pub fn wei_to_ether(wei: U256) -> f64 {
    ethers::utils::format_ether(wei).parse().unwrap_or(0.0)
}

/// Scale a raw token amount by `10^decimals` in floating point.
#[must_use]
pub fn scale_amount(raw: U256, decimals: u8) -> f64 {
    let raw: f64 = raw.to_string().parse().unwrap_or(0.0);
    raw / 10f64.powi(i32::from(decimals))
}

/// Shorten an address for display: `0xdAC1...1ec7`.
#[must_use]
pub fn short_address(address: &str) -> String {
    if address.len() <= 12 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

/// `SYM Balance: 1.2345 SYM ($1.23)`; fiat part omitted without a quote.
#[must_use]
pub fn format_balance_line(result: &BalanceResult) -> String {
    let mut line = format!(
        "{sym} Balance: {amount:.4} {sym}",
        sym = result.symbol,
        amount = result.formatted_amount
    );
    if let Some(usd) = result.usd_value {
        line.push_str(&format!(" (${usd:.2})"));
    }
    line
}

/// Per-token slot line, prefixed with the user's note when it differs from the symbol.
#[must_use]
pub fn format_token_line(note: &str, result: &BalanceResult) -> String {
    let line = format_balance_line(result);
    if note.is_empty() || note.eq_ignore_ascii_case(&result.symbol) {
        line
    } else {
        format!("[{note}] {line}")
    }
}
