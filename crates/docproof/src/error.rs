//! Error types for the engine.

use docproof_core::{Address, ContractError, ValidationError};
use docproof_ledger::{LedgerError, WalletError};
use thiserror::Error;

/// Every failure the engine reports resolves to one of these kinds.
///
/// - `Validation`: caller input is malformed; never retried.
/// - `Wallet`: signing or authorization failed; never retried.
/// - `Network`: the ledger could not complete the request; retried where
///   the operation allows it, then surfaced with the last cause attached.
/// - `Contract`: the registry contract rejected the call with a coded reason.
#[derive(Debug, Error)]
pub enum NotaryError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<LedgerError>,
    },

    #[error("contract error: {0}")]
    Contract(#[from] ContractError),
}

impl NotaryError {
    pub fn network(message: impl Into<String>, source: LedgerError) -> Self {
        NotaryError::Network {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Failure to load an account snapshot.
    pub(crate) fn account_load(address: &Address, source: LedgerError) -> Self {
        match source {
            LedgerError::NotFound(_) => NotaryError::network(
                format!("account {address} not found; it may not be funded yet"),
                source,
            ),
            other => NotaryError::network(format!("failed to load account {address}"), other),
        }
    }

    /// Failure to read a transaction stream.
    pub(crate) fn stream_query(what: &str, source: LedgerError) -> Self {
        match source {
            LedgerError::NotFound(_) => {
                NotaryError::network(format!("{what}: account not found"), source)
            }
            other => NotaryError::network(format!("{what}: query failed"), other),
        }
    }

    /// The ledger error behind a network failure, if any.
    pub fn ledger_source(&self) -> Option<&LedgerError> {
        match self {
            NotaryError::Network { source, .. } => source.as_ref(),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, NotaryError::Validation(_))
    }

    pub fn is_wallet(&self) -> bool {
        matches!(self, NotaryError::Wallet(_))
    }

    pub fn is_network(&self) -> bool {
        matches!(self, NotaryError::Network { .. })
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, NotaryError>;
