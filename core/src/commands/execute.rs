use std::time::Duration;

use anyhow::{bail, Result};

use super::help::help_text;
use super::Command;
use crate::display::short_address;
use crate::render::{Slot, SlotBoard};
use crate::session::{ConnectionState, Session};

impl Command {
    /// Execute a command against the session and return the output string.
    /// `board` is the renderer the session writes to.
    pub async fn execute(
        &self,
        session: &mut Session,
        board: &SlotBoard,
        json_output: bool,
    ) -> Result<String> {
        if self.needs_account() && session.account().await.is_none() {
            bail!("Not connected. Use 'connect' first.");
        }

        match self {
            Command::Connect => {
                let account = session.connect().await?;
                Ok(with_board(format!("Connected: {account}"), board, json_output))
            }

            Command::Disconnect => {
                session.disconnect().await;
                Ok(with_board("Disconnected.".to_string(), board, json_output))
            }

            Command::Toggle => {
                let message = match session.toggle().await? {
                    Some(account) => format!("Connected: {account}"),
                    None => "Disconnected.".to_string(),
                };
                Ok(with_board(message, board, json_output))
            }

            Command::Refresh => {
                session.refresh().await?;
                Ok(format_board(board, json_output))
            }

            Command::Show => Ok(format_board(board, json_output)),

            Command::Tokens => {
                let tokens = session.tokens().await;
                if json_output {
                    return Ok(serde_json::to_string(&tokens)?);
                }
                let mut lines = Vec::with_capacity(tokens.len() + 1);
                lines.push(format!("Watching {} token(s):", tokens.len()));
                for (i, t) in tokens.iter().enumerate() {
                    let primary = if i == 0 { " (primary)" } else { "" };
                    if t.note.is_empty() {
                        lines.push(format!("  {}. {}{primary}", i + 1, t.address));
                    } else {
                        lines.push(format!("  {}. {} [{}]{primary}", i + 1, t.address, t.note));
                    }
                }
                Ok(lines.join("\n"))
            }

            Command::AddToken { address, note } => {
                let token = session.add_token(address, note).await?;
                if json_output {
                    return Ok(serde_json::to_string(&token)?);
                }
                let label = if token.note.is_empty() {
                    short_address(&token.address)
                } else {
                    token.note.clone()
                };
                let mut out = format!("Now watching {label} ({})", token.address);
                if let Some(line) = board.text(&Slot::token(&token.address)) {
                    out.push_str(&format!("\n  {line}"));
                }
                Ok(out)
            }

            Command::RemoveToken { address } => {
                let token = session.remove_token(address).await?;
                if json_output {
                    return Ok(serde_json::to_string(&token)?);
                }
                Ok(format!("Stopped watching {}", token.address))
            }

            Command::Auto { seconds } => {
                session.set_auto_refresh(seconds.map(Duration::from_secs));
                let active = session.auto_refresh();
                if json_output {
                    return Ok(serde_json::json!({
                        "auto_refresh_secs": active.map(|d| d.as_secs()),
                    })
                    .to_string());
                }
                Ok(match active {
                    Some(d) => format!("Auto-refresh every {}s.", d.as_secs()),
                    None => "Auto-refresh off.".to_string(),
                })
            }

            Command::Network => {
                let status = session.status().await;
                let warning = board.snapshot().warning;
                if json_output {
                    return Ok(serde_json::json!({
                        "chain_id": status.chain.as_ref().map(|c| c.chain_id.0),
                        "name": status.chain.as_ref().map(|c| c.name.clone()),
                        "supported": status.chain.as_ref().map(|c| c.supported),
                        "explorer": status.chain.as_ref().map(|c| c.explorer_base_url.clone()),
                    })
                    .to_string());
                }
                match status.chain {
                    None => Ok("Network: not connected".to_string()),
                    Some(info) => {
                        let mut out = format!("Network: {} (chain {})", info.name, info.chain_id);
                        if !info.explorer_base_url.is_empty() {
                            out.push_str(&format!("\nExplorer: {}", info.explorer_base_url));
                        }
                        if let Some(w) = warning {
                            out.push_str(&format!("\n{w}"));
                        }
                        Ok(out)
                    }
                }
            }

            Command::Switch => {
                session.switch_to_mainnet().await?;
                Ok("Requested switch to Ethereum Mainnet.".to_string())
            }

            Command::Account => {
                let status = session.status().await;
                let account = match &status.state {
                    ConnectionState::Connected(a) => Some(a.clone()),
                    ConnectionState::Disconnected => None,
                };
                if json_output {
                    let explorer = match (&account, &status.chain) {
                        (Some(a), Some(c)) => c.address_url(a),
                        _ => None,
                    };
                    return Ok(serde_json::json!({
                        "account": account,
                        "explorer_url": explorer,
                    })
                    .to_string());
                }
                match account {
                    None => Ok("Not connected.".to_string()),
                    Some(a) => {
                        let mut out = format!("Account: {a}");
                        if let Some(url) = status.chain.as_ref().and_then(|c| c.address_url(&a)) {
                            out.push_str(&format!("\nExplorer: {url}"));
                        }
                        Ok(out)
                    }
                }
            }

            Command::Help { command } => Ok(help_text(command.as_deref())),

            Command::Exit => Ok(String::new()),
        }
    }
}

fn with_board(message: String, board: &SlotBoard, json_output: bool) -> String {
    if json_output {
        format_board(board, true)
    } else {
        format!("{message}\n{}", format_board(board, false))
    }
}

/// Board as text lines or as a JSON object.
pub fn format_board(board: &SlotBoard, json_output: bool) -> String {
    if !json_output {
        return board.lines().join("\n");
    }
    let state = board.snapshot();
    let slots: Vec<serde_json::Value> = state
        .slots
        .iter()
        .map(|(slot, text)| {
            let name = match slot {
                Slot::Account => "account".to_string(),
                Slot::Native => "native".to_string(),
                Slot::Primary => "primary".to_string(),
                Slot::Token(address) => address.clone(),
            };
            serde_json::json!({ "slot": name, "text": text })
        })
        .collect();
    serde_json::json!({
        "network": state.network_label,
        "warning": state.warning.map(|w| w.to_string()),
        "loading": state.loading,
        "slots": slots,
    })
    .to_string()
}
