//! File fingerprints: the content digest that is registered on the ledger.
//!
//! A fingerprint is a SHA-256 digest, written as 64 lowercase hex
//! characters. The hex text itself (not the raw digest) is what gets stored
//! on-chain, so the ASCII bytes of [`FileFingerprint::as_str`] are the unit
//! of comparison everywhere.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Length of a fingerprint in hex characters.
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// A 256-bit content digest in canonical lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileFingerprint(String);

impl FileFingerprint {
    /// Parse a caller-supplied fingerprint.
    ///
    /// Upper-case hex is accepted and normalized to lower case.
    pub fn from_hex(s: &str) -> Result<Self, ValidationError> {
        let len = s.chars().count();
        if len != FINGERPRINT_HEX_LEN {
            return Err(ValidationError::FingerprintLength(len));
        }
        if let Some(bad) = s.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ValidationError::FingerprintNotHex(bad));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Build a fingerprint from a raw 32-byte digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    /// Fingerprint of an in-memory buffer.
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = FingerprintHasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The bytes stored on the ledger for this fingerprint.
    pub fn as_ledger_value(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Whether a raw ledger value encodes this fingerprint.
    pub fn matches_ledger_value(&self, value: &[u8]) -> bool {
        value == self.as_ledger_value()
    }
}

impl fmt::Debug for FileFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileFingerprint({}..)", &self.0[..16])
    }
}

impl fmt::Display for FileFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FileFingerprint {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for FileFingerprint {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<FileFingerprint> for String {
    fn from(fp: FileFingerprint) -> Self {
        fp.0
    }
}

/// Running digest accumulator.
///
/// Bytes must be fed in file order; the result does not depend on how the
/// input is split across calls to [`update`](Self::update).
#[derive(Clone, Default)]
pub struct FingerprintHasher {
    inner: Sha256,
    consumed: u64,
}

impl FingerprintHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
        self.consumed += chunk.len() as u64;
    }

    /// Total bytes fed so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn finalize(self) -> FileFingerprint {
        FileFingerprint::from_digest(self.inner.finalize().into())
    }
}

impl fmt::Debug for FingerprintHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FingerprintHasher")
            .field("consumed", &self.consumed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn test_known_digest() {
        assert_eq!(FileFingerprint::of_bytes(b"abc").as_str(), ABC_SHA256);
    }

    #[test]
    fn test_from_hex_normalizes_case() {
        let upper = ABC_SHA256.to_ascii_uppercase();
        let fp = FileFingerprint::from_hex(&upper).unwrap();
        assert_eq!(fp.as_str(), ABC_SHA256);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        let non_hex = "z".repeat(64);
        assert!(matches!(
            FileFingerprint::from_hex(&non_hex),
            Err(ValidationError::FingerprintNotHex('z'))
        ));

        let too_long = "a".repeat(65);
        assert!(matches!(
            FileFingerprint::from_hex(&too_long),
            Err(ValidationError::FingerprintLength(65))
        ));

        assert!(matches!(
            FileFingerprint::from_hex(""),
            Err(ValidationError::FingerprintLength(0))
        ));
    }

    #[test]
    fn test_ledger_value_match() {
        let fp = FileFingerprint::of_bytes(b"abc");
        assert!(fp.matches_ledger_value(ABC_SHA256.as_bytes()));
        assert!(!fp.matches_ledger_value(&[0u8; 32]));
    }

    #[test]
    fn test_hasher_counts_bytes() {
        let mut hasher = FingerprintHasher::new();
        hasher.update(b"ab");
        hasher.update(b"c");
        assert_eq!(hasher.consumed(), 3);
        assert_eq!(hasher.finalize().as_str(), ABC_SHA256);
    }

    proptest! {
        #[test]
        fn split_point_does_not_change_digest(
            data in prop::collection::vec(any::<u8>(), 0..4096),
            split in 0usize..4096,
        ) {
            let split = split.min(data.len());
            let mut hasher = FingerprintHasher::new();
            hasher.update(&data[..split]);
            hasher.update(&data[split..]);
            prop_assert_eq!(hasher.finalize(), FileFingerprint::of_bytes(&data));
        }
    }
}
