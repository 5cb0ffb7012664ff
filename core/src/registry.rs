use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::WatchError;

/// Watched when no token list has been saved yet.
pub const DEFAULT_TOKEN_ADDRESS: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
pub const DEFAULT_TOKEN_NOTE: &str = "USDT";
pub const TOKEN_LIST_FILE: &str = "tokens.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub address: String,
    #[serde(default)]
    pub note: String,
}

impl TokenDescriptor {
    /// Validate and build a descriptor. Address must be `0x` + 40 hex chars.
    pub fn new(address: &str, note: &str) -> crate::error::Result<Self> {
        let address = address.trim();
        validate_token_address(address)?;
        Ok(Self {
            address: address.to_string(),
            note: note.trim().to_string(),
        })
    }

    /// Identity key: the lower-cased address.
    pub fn key(&self) -> String {
        self.address.to_lowercase()
    }

    pub fn default_token() -> Self {
        Self {
            address: DEFAULT_TOKEN_ADDRESS.to_string(),
            note: DEFAULT_TOKEN_NOTE.to_string(),
        }
    }
}

fn validate_token_address(addr: &str) -> crate::error::Result<()> {
    let hex = addr
        .strip_prefix("0x")
        .or_else(|| addr.strip_prefix("0X"))
        .ok_or_else(|| {
            WatchError::InvalidToken(format!(
                "Invalid token address '{addr}': must be 0x-prefixed."
            ))
        })?;
    if hex.len() != 40 {
        return Err(WatchError::InvalidToken(format!(
            "Invalid token address '{addr}': expected 40 hex characters, got {}.",
            hex.len()
        )));
    }
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WatchError::InvalidToken(format!(
            "Invalid token address '{addr}': contains non-hex characters."
        )));
    }
    Ok(())
}

/// Persistence for the watched-token list.
pub trait TokenListStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Vec<TokenDescriptor>>>;
    fn save(&self, tokens: &[TokenDescriptor]) -> Result<()>;
}

/// Token list stored as unencrypted pretty-printed JSON.
///
/// Path: `data_dir()/tokens.json` unless configured otherwise.
pub struct JsonTokenStore {
    path: PathBuf,
}

impl JsonTokenStore {
    pub fn open() -> Result<Self> {
        Ok(Self::at(crate::data_dir()?.join(TOKEN_LIST_FILE)))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TokenListStore for JsonTokenStore {
    fn load(&self) -> Result<Option<Vec<TokenDescriptor>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let tokens = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(tokens))
    }

    fn save(&self, tokens: &[TokenDescriptor]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create token list directory")?;
        }
        let json = serde_json::to_string_pretty(tokens).context("Failed to serialize token list")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// Store that keeps the list in memory only.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: std::sync::Mutex<Option<Vec<TokenDescriptor>>>,
}

impl MemoryTokenStore {
    pub fn with_tokens(tokens: Vec<TokenDescriptor>) -> Self {
        Self {
            tokens: std::sync::Mutex::new(Some(tokens)),
        }
    }
}

impl TokenListStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<Vec<TokenDescriptor>>> {
        let guard = self
            .tokens
            .lock()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, tokens: &[TokenDescriptor]) -> Result<()> {
        let mut guard = self
            .tokens
            .lock()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))?;
        *guard = Some(tokens.to_vec());
        Ok(())
    }
}

/// Ordered list of watched tokens. Sole owner of the list; insertion order is
/// display order.
pub struct TokenRegistry {
    store: Box<dyn TokenListStore>,
    tokens: Vec<TokenDescriptor>,
}

impl TokenRegistry {
    /// Load from `store`. A missing, unreadable or empty list falls back to
    /// the built-in default token.
    pub fn load(store: Box<dyn TokenListStore>) -> Self {
        let tokens = match store.load() {
            Ok(Some(tokens)) => sanitize(tokens),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("token list unreadable, using default: {e:#}");
                Vec::new()
            }
        };
        let tokens = if tokens.is_empty() {
            vec![TokenDescriptor::default_token()]
        } else {
            tokens
        };
        Self { store, tokens }
    }

    /// Append a token. Rejects malformed and duplicate (case-insensitive) addresses.
    pub fn add(&mut self, address: &str, note: &str) -> crate::error::Result<&TokenDescriptor> {
        let descriptor = TokenDescriptor::new(address, note)?;
        if self.contains(&descriptor.address) {
            return Err(WatchError::DuplicateToken(descriptor.address));
        }
        self.tokens.push(descriptor);
        self.persist()?;
        Ok(&self.tokens[self.tokens.len() - 1])
    }

    /// Remove by address (case-insensitive).
    pub fn remove(&mut self, address: &str) -> crate::error::Result<TokenDescriptor> {
        let key = address.trim().to_lowercase();
        let pos = self
            .tokens
            .iter()
            .position(|t| t.key() == key)
            .ok_or_else(|| {
                WatchError::InvalidToken(format!("Token {address} is not being watched."))
            })?;
        let removed = self.tokens.remove(pos);
        self.persist()?;
        Ok(removed)
    }

    pub fn contains(&self, address: &str) -> bool {
        let key = address.trim().to_lowercase();
        self.tokens.iter().any(|t| t.key() == key)
    }

    pub fn get(&self, address: &str) -> Option<&TokenDescriptor> {
        let key = address.trim().to_lowercase();
        self.tokens.iter().find(|t| t.key() == key)
    }

    /// Token shown in the single-token display slot.
    pub fn primary(&self) -> Option<&TokenDescriptor> {
        self.tokens.first()
    }

    pub fn list(&self) -> &[TokenDescriptor] {
        &self.tokens
    }

    pub fn snapshot(&self) -> Vec<TokenDescriptor> {
        self.tokens.clone()
    }

    fn persist(&self) -> crate::error::Result<()> {
        self.store
            .save(&self.tokens)
            .map_err(|e| WatchError::Storage(format!("Failed to save token list: {e:#}")))
    }
}

/// Drop invalid and duplicate entries from a loaded list, keeping first occurrences.
fn sanitize(tokens: Vec<TokenDescriptor>) -> Vec<TokenDescriptor> {
    let mut out: Vec<TokenDescriptor> = Vec::with_capacity(tokens.len());
    for t in tokens {
        match TokenDescriptor::new(&t.address, &t.note) {
            Ok(d) if !out.iter().any(|e| e.key() == d.key()) => out.push(d),
            Ok(d) => warn!("skipping duplicate token {}", d.address),
            Err(e) => warn!("skipping invalid token entry: {e}"),
        }
    }
    out
}
