#[must_use]
pub fn help_text(command: Option<&str>) -> String {
    match command {
        Some("connect") => {
            "connect\n  Ask the wallet for account access, then load network info and balances.".to_string()
        }
        Some("disconnect") => {
            "disconnect\n  Forget the account locally and stop auto-refresh.\n  The wallet keeps its authorization.".to_string()
        }
        Some("toggle") => {
            "toggle\n  Disconnect when connected, connect otherwise.".to_string()
        }
        Some("refresh") | Some("r") => {
            "refresh\n  Re-fetch the ETH balance and every watched token.\n  Alias: r".to_string()
        }
        Some("show") | Some("balances") | Some("bal") => {
            "show\n  Print the current balance board without fetching.\n  Aliases: balances, bal".to_string()
        }
        Some("tokens") => {
            "tokens\n  List watched tokens in display order.".to_string()
        }
        Some("add_token") | Some("add") => {
            "add_token <address> [note]\n  Watch another ERC-20 token. The note labels the token\n  and stands in for its symbol if the contract has none.\n  Example: add_token 0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48 USDC\n  Alias: add".to_string()
        }
        Some("remove_token") | Some("rm") => {
            "remove_token <address>\n  Stop watching a token.\n  Alias: rm".to_string()
        }
        Some("auto") => {
            "auto <seconds|off>\n  Refresh balances periodically. The first refresh runs\n  one full interval after arming.\n  Examples: auto 30\n           auto off".to_string()
        }
        Some("network") | Some("net") => {
            "network\n  Show the active chain and whether it is supported.\n  Alias: net".to_string()
        }
        Some("switch") => {
            "switch\n  Ask the wallet to switch to Ethereum Mainnet.".to_string()
        }
        Some("account") | Some("acc") => {
            "account\n  Show the connected account.\n  Alias: acc".to_string()
        }
        Some("exit") | Some("quit") | Some("q") => {
            "exit\n  Exit the watcher.\n  Aliases: quit, q".to_string()
        }
        Some(other) => format!("Unknown command: '{other}'. Type 'help' for a list."),
        None => {
            "Available commands:\n\
             \n\
             \x20 connect          Connect the wallet\n\
             \x20 disconnect       Disconnect the wallet\n\
             \x20 toggle           Connect or disconnect\n\
             \x20 refresh          Re-fetch all balances\n\
             \x20 show             Print the balance board\n\
             \x20 tokens           List watched tokens\n\
             \x20 add_token        Watch another token\n\
             \x20 remove_token     Stop watching a token\n\
             \x20 auto             Set or stop periodic refresh\n\
             \x20 network          Show the active network\n\
             \x20 switch           Switch to Ethereum Mainnet\n\
             \x20 account          Show the connected account\n\
             \x20 help [cmd]       Show help for a command\n\
             \x20 exit             Exit the watcher\n\
             \n\
             Type 'help <command>' for detailed help on a specific command."
                .to_string()
        }
    }
}
