mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use walletwatch_core::commands::Command;
use walletwatch_core::{build_session, SlotBoard, WatchConfig};

#[derive(Parser)]
#[command(name = "walletwatch", about = "Wallet balance watcher for EVM chains", version)]
pub(crate) struct Cli {
    /// JSON-RPC endpoint of the wallet or node
    #[arg(long, env = "WALLETWATCH_RPC_URL")]
    rpc: Option<String>,

    /// Price API base URL (CoinGecko compatible)
    #[arg(long, env = "WALLETWATCH_PRICE_API")]
    price_api: Option<String>,

    /// Token list file (default: <data dir>/walletwatch/tokens.json)
    #[arg(long, env = "WALLETWATCH_TOKENS")]
    tokens: Option<PathBuf>,

    /// Watch this address read-only instead of the node's accounts
    #[arg(long, env = "WALLETWATCH_ADDRESS")]
    address: Option<String>,

    /// Auto-refresh interval in seconds
    #[arg(long, env = "WALLETWATCH_AUTO_REFRESH")]
    auto: Option<u64>,

    /// Seconds between account/chain polls
    #[arg(long, env = "WALLETWATCH_POLL_INTERVAL")]
    poll_interval: Option<u64>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "WALLETWATCH_TIMEOUT")]
    timeout: Option<u64>,

    /// Run a single command and exit
    #[arg(long)]
    cmd: Option<String>,

    /// Output in JSON format (useful with --cmd)
    #[arg(long)]
    json: bool,

    /// Allow connecting to non-HTTPS RPC URLs
    #[arg(long)]
    insecure: bool,

    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> WatchConfig {
        let defaults = WatchConfig::default();
        WatchConfig {
            rpc_url: self.rpc.clone().unwrap_or(defaults.rpc_url),
            price_api_url: self.price_api.clone().unwrap_or(defaults.price_api_url),
            token_list_path: self.tokens.clone(),
            watch_address: self.address.clone(),
            poll_interval_secs: self.poll_interval.unwrap_or(defaults.poll_interval_secs),
            auto_refresh_secs: self.auto,
            request_timeout_secs: self.timeout.unwrap_or(defaults.request_timeout_secs),
            allow_insecure: self.insecure,
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::debug!(rpc = ?cli.rpc, oneshot = cli.cmd.is_some(), "starting");

    if let Some(cmd_str) = &cli.cmd {
        run_oneshot(&cli, cmd_str).await
    } else {
        repl::run_repl(&cli).await
    }
}

async fn run_oneshot(cli: &Cli, cmd_str: &str) -> Result<()> {
    let command = Command::parse(cmd_str)?;
    if command == Command::Exit {
        return Ok(());
    }

    let board = SlotBoard::new();
    let mut session = build_session(&cli.config(), Arc::new(board.clone()))?;
    session.probe().await;

    let output = command.execute(&mut session, &board, cli.json).await?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
