/// Rendering capability: display slots, network label, warning and loading state.
use std::sync::{Arc, Mutex};

use crate::display::{short_address, NATIVE_SYMBOL};
use crate::registry::TokenDescriptor;

pub const ACCOUNT_PLACEHOLDER: &str = "Not connected";
pub const NETWORK_PLACEHOLDER: &str = "Not connected";

/// A place a formatted balance (or status line) is written to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    Account,
    Native,
    /// Legacy single-token slot, fed by the first registered token.
    Primary,
    /// Per-token slot keyed by lower-cased address.
    Token(String),
}

impl Slot {
    pub fn token(address: &str) -> Self {
        Slot::Token(address.to_lowercase())
    }

    /// Text shown before any balance has been fetched.
    pub fn placeholder(&self) -> String {
        match self {
            Slot::Account => ACCOUNT_PLACEHOLDER.to_string(),
            Slot::Native => format!("{NATIVE_SYMBOL} Balance: --"),
            Slot::Primary => "Token Balance: --".to_string(),
            Slot::Token(address) => format!("{}: --", short_address(address)),
        }
    }
}

/// Label used for a token slot before its first fetch.
pub fn token_placeholder(token: &TokenDescriptor) -> String {
    if token.note.is_empty() {
        format!("{}: --", short_address(&token.address))
    } else {
        format!("{}: --", token.note)
    }
}

/// Placeholder text for every slot of a disconnected board.
pub fn placeholders(tokens: &[TokenDescriptor]) -> Vec<(Slot, String)> {
    let mut out: Vec<(Slot, String)> = [Slot::Account, Slot::Native, Slot::Primary]
        .into_iter()
        .map(|slot| {
            let text = slot.placeholder();
            (slot, text)
        })
        .collect();
    out.extend(
        tokens
            .iter()
            .map(|t| (Slot::token(&t.address), token_placeholder(t))),
    );
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkWarning {
    /// Active chain is unsupported; offer a switch to Ethereum Mainnet.
    SwitchToMainnet,
}

impl std::fmt::Display for NetworkWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SwitchToMainnet => {
                write!(f, "Unsupported network. Use 'switch' to change to Ethereum Mainnet.")
            }
        }
    }
}

pub trait Renderer: Send + Sync {
    fn render(&self, slot: Slot, text: String);
    fn set_network_label(&self, label: String);
    fn set_network_warning(&self, warning: Option<NetworkWarning>);
    fn set_loading(&self, loading: bool);
    /// Remove a slot from the display.
    fn clear(&self, slot: &Slot);
    /// Drop every slot and show the given placeholder texts instead.
    fn reset(&self, placeholders: &[(Slot, String)]);
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardState {
    /// Slots in display order. New slots are appended, so token slots keep
    /// the order their tokens were added in.
    pub slots: Vec<(Slot, String)>,
    pub network_label: String,
    pub warning: Option<NetworkWarning>,
    pub loading: bool,
}

/// In-memory renderer holding the latest text per slot.
#[derive(Debug, Default, Clone)]
pub struct SlotBoard {
    state: Arc<Mutex<BoardState>>,
}

impl SlotBoard {
    pub fn new() -> Self {
        let board = Self::default();
        board.reset(&placeholders(&[]));
        board.set_network_label(NETWORK_PLACEHOLDER.to_string());
        board
    }

    pub fn snapshot(&self) -> BoardState {
        self.lock().clone()
    }

    pub fn text(&self, slot: &Slot) -> Option<String> {
        self.lock()
            .slots
            .iter()
            .find(|(s, _)| s == slot)
            .map(|(_, text)| text.clone())
    }

    /// Board as printable lines: account, network, warning, native, primary, tokens.
    pub fn lines(&self) -> Vec<String> {
        let state = self.snapshot();
        let mut lines = Vec::with_capacity(state.slots.len() + 2);
        for (slot, text) in &state.slots {
            match slot {
                Slot::Account => {
                    lines.push(text.clone());
                    lines.push(format!("Network: {}", state.network_label));
                    if let Some(w) = state.warning {
                        lines.push(format!("Warning: {w}"));
                    }
                }
                Slot::Token(_) => lines.push(format!("  {text}")),
                _ => lines.push(text.clone()),
            }
        }
        if state.loading {
            lines.push("(refreshing...)".to_string());
        }
        lines
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Renderer for SlotBoard {
    fn render(&self, slot: Slot, text: String) {
        let mut state = self.lock();
        match state.slots.iter_mut().find(|(s, _)| *s == slot) {
            Some((_, current)) => *current = text,
            None => state.slots.push((slot, text)),
        }
    }

    fn set_network_label(&self, label: String) {
        self.lock().network_label = label;
    }

    fn set_network_warning(&self, warning: Option<NetworkWarning>) {
        self.lock().warning = warning;
    }

    fn set_loading(&self, loading: bool) {
        self.lock().loading = loading;
    }

    fn clear(&self, slot: &Slot) {
        self.lock().slots.retain(|(s, _)| s != slot);
    }

    fn reset(&self, placeholders: &[(Slot, String)]) {
        self.lock().slots = placeholders.to_vec();
    }
}
