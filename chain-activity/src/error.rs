//! Error types for the session and data layers.

use thiserror::Error;

use crate::chains::ChainId;

/// EIP-1193: the user rejected the request.
pub const CODE_USER_REJECTED: i64 = 4001;

/// MetaMask: a request of the same kind is already pending.
pub const CODE_REQUEST_PENDING: i64 = -32002;

/// EIP-3326: the requested chain has not been added to the wallet.
pub const CODE_UNRECOGNIZED_CHAIN: i64 = 4902;

/// Errors parsing user- or provider-supplied identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid chain id: {0}")]
    ChainId(String),
    #[error("invalid address: {0}")]
    Address(String),
}

/// Errors reported by a wallet provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("request rejected by the user")]
    UserRejected,
    #[error("a wallet request is already pending")]
    RequestPending,
    #[error("chain {0} is not recognized by the wallet")]
    UnrecognizedChain(ChainId),
    #[error("wallet error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("wallet transport error: {0}")]
    Transport(String),
}

impl WalletError {
    /// Classify a provider error code.
    ///
    /// `chain` is the chain a switch request targeted, if any.
    pub fn from_code(code: i64, message: impl Into<String>, chain: Option<ChainId>) -> Self {
        match (code, chain) {
            (CODE_USER_REJECTED, _) => Self::UserRejected,
            (CODE_REQUEST_PENDING, _) => Self::RequestPending,
            (CODE_UNRECOGNIZED_CHAIN, Some(chain)) => Self::UnrecognizedChain(chain),
            (code, _) => Self::Rpc {
                code,
                message: message.into(),
            },
        }
    }

    /// True for errors that must never be shown to the user.
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::UserRejected | Self::RequestPending)
    }
}

/// Errors reported by the blockchain data provider.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),
    #[error("provider error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed provider response: {0}")]
    Decode(String),
    #[error("missing result in provider response")]
    MissingResult,
    #[error("no data provider network for chain {0}")]
    UnsupportedChain(ChainId),
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Decode(err.to_string())
    }
}

impl From<ParseError> for DataError {
    fn from(err: ParseError) -> Self {
        DataError::Decode(err.to_string())
    }
}

/// Failures of user-facing session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("request rejected in the wallet")]
    UserRejected,
    #[error("No wallet provider found. Install a browser wallet such as MetaMask.")]
    ProviderUnavailable,
    #[error("Failed to switch network: {0}")]
    NetworkSwitchFailed(String),
    #[error("Failed to fetch history")]
    HistoryFetchFailed(#[source] DataError),
    #[error("Failed to fetch metadata for token {contract}")]
    TokenMetadataFetchFailed {
        contract: String,
        #[source]
        source: DataError,
    },
    #[error("Failed to connect wallet: {0}")]
    GenericConnectFailure(String),
    #[error("Unsupported chain {0}")]
    UnsupportedChain(ChainId),
}

impl SessionError {
    /// True when the failure is suppressed rather than surfaced.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::UserRejected)
    }
}

impl From<WalletError> for SessionError {
    fn from(err: WalletError) -> Self {
        if err.is_user_rejection() {
            return SessionError::UserRejected;
        }
        SessionError::GenericConnectFailure(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, SessionError>;
