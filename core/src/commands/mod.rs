/// Command definitions and parsing for the watcher REPL and one-shot mode.
mod execute;
mod help;
mod parse;

pub use execute::format_board;
pub use help::help_text;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Ask the wallet for access and load balances
    Connect,
    /// Forget the account locally
    Disconnect,
    /// Connect when disconnected, disconnect otherwise
    Toggle,
    /// Re-fetch every balance
    Refresh,
    /// Print the balance board
    Show,
    /// List watched tokens
    Tokens,
    /// Watch another token: add_token <address> [note]
    AddToken { address: String, note: String },
    /// Stop watching a token: remove_token <address>
    RemoveToken { address: String },
    /// Periodic refresh: auto <seconds|off>
    Auto { seconds: Option<u64> },
    /// Show the active network
    Network,
    /// Ask the wallet to switch to Ethereum Mainnet
    Switch,
    /// Show the connected account
    Account,
    /// Print help
    Help { command: Option<String> },
    /// Exit the watcher
    Exit,
}

impl Command {
    /// Commands that only make sense with a connected account.
    pub fn needs_account(&self) -> bool {
        matches!(self, Command::Refresh | Command::Switch)
    }
}
