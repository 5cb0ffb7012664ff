use anyhow::{bail, Context, Result};

use super::Command;
use crate::registry::TokenDescriptor;

impl Command {
    /// Parse a command from a raw input string.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            bail!("No command entered. Type 'help' for a list of commands.");
        }

        let mut parts = input.splitn(3, char::is_whitespace);
        let cmd = parts.next().unwrap_or_default().to_lowercase();
        let arg1 = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());
        let arg2 = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

        match cmd.as_str() {
            "connect" => Ok(Command::Connect),

            "disconnect" => Ok(Command::Disconnect),

            "toggle" => Ok(Command::Toggle),

            "refresh" | "r" => Ok(Command::Refresh),

            "show" | "balances" | "bal" => Ok(Command::Show),

            "tokens" => Ok(Command::Tokens),

            "add_token" | "add" => {
                let address = arg1.ok_or_else(|| {
                    anyhow::anyhow!("Missing token address. Usage: add_token <address> [note]")
                })?;
                // Validate early so typos fail before touching the registry.
                TokenDescriptor::new(address, "")?;
                Ok(Command::AddToken {
                    address: address.to_string(),
                    note: arg2.unwrap_or_default().to_string(),
                })
            }

            "remove_token" | "rm" => {
                let address = arg1.ok_or_else(|| {
                    anyhow::anyhow!("Missing token address. Usage: remove_token <address>")
                })?;
                Ok(Command::RemoveToken {
                    address: address.to_string(),
                })
            }

            "auto" => {
                let arg = arg1.ok_or_else(|| {
                    anyhow::anyhow!("Missing interval. Usage: auto <seconds|off>")
                })?;
                let seconds = match arg.to_lowercase().as_str() {
                    "off" | "0" => None,
                    s => Some(
                        s.parse::<u64>()
                            .with_context(|| format!("Invalid interval '{arg}'"))?,
                    ),
                };
                Ok(Command::Auto { seconds })
            }

            "network" | "net" => Ok(Command::Network),

            "switch" => Ok(Command::Switch),

            "account" | "acc" => Ok(Command::Account),

            "help" | "?" => Ok(Command::Help {
                command: arg1.map(|s| s.to_string()),
            }),

            "exit" | "quit" | "q" => Ok(Command::Exit),

            other => bail!("Unknown command: '{other}'. Type 'help' for a list of commands."),
        }
    }
}
