//! Error types for the ledger and wallet collaborators.

use thiserror::Error;

/// Result codes the ledger attaches to rejected submissions.
pub mod codes {
    pub const TX_FAILED: &str = "tx_failed";
    pub const TX_BAD_SEQ: &str = "tx_bad_seq";
    pub const TX_BAD_AUTH: &str = "tx_bad_auth";
    pub const TX_TOO_LATE: &str = "tx_too_late";
    pub const TX_NO_SOURCE_ACCOUNT: &str = "tx_no_source_account";
    pub const TX_INSUFFICIENT_FEE: &str = "tx_insufficient_fee";
    pub const OP_ALREADY_EXISTS: &str = "op_already_exists";
    /// Prefix of an operation code carrying a contract error number.
    pub const CONTRACT_ERROR_PREFIX: &str = "contract_error_";
}

/// Errors that can occur talking to the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The requested account or transaction does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The ledger refused a submitted transaction.
    #[error("transaction rejected ({code}): operations {operation_codes:?}")]
    Rejected {
        code: String,
        operation_codes: Vec<String>,
    },

    /// The document registry contract rejected the call.
    #[error("contract call failed with code {code}")]
    ContractFailure { code: u32 },

    /// The request was malformed (bad cursor, limit out of range).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Non-success HTTP response without a recognizable body.
    #[error("server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),

    /// A response or envelope could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The ledger could not be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    pub(crate) fn rejected(code: &str, operation_codes: &[&str]) -> Self {
        LedgerError::Rejected {
            code: code.to_string(),
            operation_codes: operation_codes.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Whether the rejection says a data entry already exists under the key.
    pub fn is_entry_exists(&self) -> bool {
        match self {
            LedgerError::Rejected {
                operation_codes, ..
            } => operation_codes.iter().any(|c| c == codes::OP_ALREADY_EXISTS),
            _ => false,
        }
    }

    /// Contract error number carried by an operation result code, if any.
    pub fn contract_code(&self) -> Option<u32> {
        match self {
            LedgerError::ContractFailure { code } => Some(*code),
            LedgerError::Rejected {
                operation_codes, ..
            } => operation_codes.iter().find_map(|c| {
                c.strip_prefix(codes::CONTRACT_ERROR_PREFIX)
                    .and_then(|n| n.parse().ok())
            }),
            _ => None,
        }
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors raised by the wallet collaborator.
///
/// These are kept apart from ledger failures: a wallet problem is never
/// fixed by retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("wallet is not available")]
    Unavailable,

    #[error("wallet has no connected account")]
    NoAccount,

    #[error("user rejected the request: {0}")]
    UserRejected(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_exists_detection() {
        let err = LedgerError::rejected(codes::TX_FAILED, &[codes::OP_ALREADY_EXISTS]);
        assert!(err.is_entry_exists());
        assert!(!LedgerError::rejected(codes::TX_BAD_SEQ, &[]).is_entry_exists());
    }

    #[test]
    fn test_contract_code_from_operation_code() {
        let err = LedgerError::rejected(codes::TX_FAILED, &["contract_error_3"]);
        assert_eq!(err.contract_code(), Some(3));
        assert_eq!(LedgerError::ContractFailure { code: 2 }.contract_code(), Some(2));
        assert_eq!(LedgerError::NotFound("x".into()).contract_code(), None);
    }
}
