//! Domain error type for the balance watcher.

use thiserror::Error;

use crate::provider::ProviderError;

/// Typed error enum for session operations, allowing callers to tell a
/// blocking failure (no provider) from an inline one (rejected request)
/// without inspecting opaque `anyhow::Error` messages.
#[derive(Debug, Error)]
pub enum WatchError {
    /// No wallet provider is reachable. Fatal to `connect`.
    #[error("No wallet provider available. Check the RPC endpoint and try again.")]
    ProviderUnavailable,

    /// The user (or the provider on their behalf) declined the request.
    #[error("Request rejected: {0}")]
    UserRejected(String),

    /// The provider answered with an empty account list.
    #[error("The wallet returned no accounts.")]
    NoAccounts,

    /// Operation needs a connected account.
    #[error("Not connected. Use 'connect' first.")]
    NotConnected,

    /// Malformed token address or descriptor.
    #[error("{0}")]
    InvalidToken(String),

    /// Token already present in the registry (case-insensitive address match).
    #[error("Token {0} is already being watched.")]
    DuplicateToken(String),

    /// Chain id the provider reported could not be parsed.
    #[error("Invalid chain id: {0}")]
    InvalidChainId(String),

    /// RPC or HTTP communication failure.
    #[error("{0}")]
    Network(String),

    /// Token list persistence failure.
    #[error("{0}")]
    Storage(String),

    /// Unexpected error from internal subsystems.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ProviderError> for WatchError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(_) => WatchError::ProviderUnavailable,
            ProviderError::Rejected(msg) => WatchError::UserRejected(msg),
            ProviderError::Unsupported(msg) | ProviderError::Rpc(msg) => WatchError::Network(msg),
        }
    }
}

/// Alias for `std::result::Result<T, WatchError>`.
pub type Result<T> = std::result::Result<T, WatchError>;
