//! # docproof core
//!
//! Pure primitives for document registration and verification: content
//! fingerprints, document names, registration records and verdicts.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`FileFingerprint`] - 64-character lowercase hex SHA-256 of a file
//! - [`FingerprintHasher`] - incremental accumulator producing fingerprints
//! - [`DocumentName`] - validated label, stored under the `doc:` namespace
//! - [`DocumentRecord`] - a registration observed in a ledger transaction
//! - [`VerificationVerdict`] - result of a lookup, never persisted
//! - [`HistoryPage`] / [`Cursor`] - paged history with opaque resumption

pub mod crypto;
pub mod document;
pub mod error;
pub mod fingerprint;
pub mod types;

pub use crypto::{sha256, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use document::{
    Cursor, DocumentName, DocumentRecord, HistoryPage, VerificationVerdict, DATA_KEY_PREFIX,
    MAX_NAME_LEN,
};
pub use error::{ContractError, ValidationError};
pub use fingerprint::{FileFingerprint, FingerprintHasher, FINGERPRINT_HEX_LEN};
pub use types::{Address, Network, TransactionId};
