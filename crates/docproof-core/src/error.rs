//! Error types for docproof core primitives.

use thiserror::Error;

/// Caller input that can never succeed as given.
///
/// Validation failures are raised before any network activity and are
/// never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("fingerprint must be exactly 64 hex characters, got {0}")]
    FingerprintLength(usize),

    #[error("fingerprint contains non-hex character {0:?}")]
    FingerprintNotHex(char),

    #[error("document name must not be empty")]
    EmptyName,

    #[error("document name exceeds {max} characters (got {len})")]
    NameTooLong { len: usize, max: usize },

    #[error("document name contains invalid character {0:?} (allowed: alphanumeric, '.', '_', '-')")]
    NameInvalidChar(char),

    #[error("file is empty")]
    EmptyFile,

    #[error("file size {size} exceeds maximum of {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("file length changed while hashing: expected {expected} bytes, read {actual}")]
    FileLengthMismatch { expected: u64, actual: u64 },

    #[error("hashing aborted by progress callback: {0}")]
    ProgressAborted(String),

    #[error("could not read file: {0}")]
    Read(String),

    #[error("history limit must be between 1 and {max}, got {got}")]
    LimitOutOfRange { got: usize, max: usize },

    #[error("cursor is not a token issued by a previous history page")]
    InvalidCursor,

    #[error("document {fingerprint} is already registered by this account as {name:?}")]
    AlreadyRegistered { fingerprint: String, name: String },

    #[error("document name {0:?} is already used by this account")]
    DuplicateName(String),

    #[error("unknown network {0:?} (expected \"testnet\" or \"mainnet\")")]
    InvalidNetwork(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coded rejection returned by the document registry contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("document hash must be 64 characters")]
    InvalidHashLength,

    #[error("document name is empty or too long")]
    InvalidDocumentName,

    #[error("document is already registered")]
    DocumentAlreadyExists,

    #[error("contract rejected the call with unknown code {0}")]
    Unknown(u32),
}

impl ContractError {
    /// Map a contract error code to its cause.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => ContractError::InvalidHashLength,
            2 => ContractError::InvalidDocumentName,
            3 => ContractError::DocumentAlreadyExists,
            other => ContractError::Unknown(other),
        }
    }

    /// The numeric code the contract uses for this error.
    pub fn code(&self) -> u32 {
        match self {
            ContractError::InvalidHashLength => 1,
            ContractError::InvalidDocumentName => 2,
            ContractError::DocumentAlreadyExists => 3,
            ContractError::Unknown(code) => *code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_codes() {
        assert_eq!(ContractError::from_code(3), ContractError::DocumentAlreadyExists);
        assert_eq!(ContractError::from_code(1).code(), 1);
        assert_eq!(ContractError::from_code(42), ContractError::Unknown(42));
    }
}
