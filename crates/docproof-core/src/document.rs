//! Documents as they appear to callers: names, records, verdicts and pages.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::fingerprint::FileFingerprint;
use crate::types::{Address, TransactionId};

/// Namespace tag prepended to a document name to form its ledger key.
pub const DATA_KEY_PREFIX: &str = "doc:";

/// Longest accepted document name.
///
/// The namespaced key must fit the ledger's 64-byte key limit with room
/// for a terminator.
pub const MAX_NAME_LEN: usize = 59;

/// A user-supplied document label.
///
/// Restricted to ASCII alphanumerics plus `.`, `_` and `-`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentName(String);

impl DocumentName {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let len = name.chars().count();
        if len > MAX_NAME_LEN {
            return Err(ValidationError::NameTooLong {
                len,
                max: MAX_NAME_LEN,
            });
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(ValidationError::NameInvalidChar(bad));
        }
        Ok(Self(name.to_string()))
    }

    /// Recover a name from a namespaced ledger key.
    ///
    /// Returns `None` for keys outside the namespace or carrying a name
    /// that would not pass validation.
    pub fn from_data_key(key: &str) -> Option<Self> {
        key.strip_prefix(DATA_KEY_PREFIX)
            .and_then(|name| Self::new(name).ok())
    }

    /// The namespaced ledger key, `doc:<name>`.
    pub fn data_key(&self) -> String {
        format!("{DATA_KEY_PREFIX}{}", self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DocumentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentName({})", self.0)
    }
}

impl fmt::Display for DocumentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DocumentName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DocumentName {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<DocumentName> for String {
    fn from(name: DocumentName) -> Self {
        name.0
    }
}

/// A registration observed in a confirmed ledger transaction.
///
/// Records are never mutated; the ledger history they come from is
/// append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub fingerprint: FileFingerprint,
    pub name: DocumentName,
    pub registrant: Address,
    pub registered_at: DateTime<Utc>,
    pub transaction_id: TransactionId,
    pub ledger: u32,
}

/// Answer to "is this fingerprint registered, and by whom".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationVerdict {
    pub is_verified: bool,
    pub registered_by: Option<Address>,
    pub registered_at: Option<DateTime<Utc>>,
    pub document_name: Option<DocumentName>,
    pub transaction_id: Option<TransactionId>,
    pub block_number: Option<u32>,
}

impl VerificationVerdict {
    pub fn not_verified() -> Self {
        Self::default()
    }

    /// Full verdict recovered from a history record.
    pub fn from_record(record: &DocumentRecord) -> Self {
        Self {
            is_verified: true,
            registered_by: Some(record.registrant.clone()),
            registered_at: Some(record.registered_at),
            document_name: Some(record.name.clone()),
            transaction_id: Some(record.transaction_id.clone()),
            block_number: Some(record.ledger),
        }
    }

    /// Verdict for a data entry whose originating transaction is not (yet)
    /// visible in history.
    pub fn partial(registrant: Address, name: DocumentName) -> Self {
        Self {
            is_verified: true,
            registered_by: Some(registrant),
            document_name: Some(name),
            ..Self::default()
        }
    }

    /// Whether timestamp and transaction details are present.
    pub fn is_complete(&self) -> bool {
        self.is_verified && self.transaction_id.is_some() && self.registered_at.is_some()
    }
}

/// One page of an account's registrations, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub records: Vec<DocumentRecord>,
    pub has_more: bool,
    pub next_cursor: Option<Cursor>,
}

/// Opaque resumption token for history paging.
///
/// The token wraps the ledger's paging token together with a short BLAKE3
/// tag, so a string that was not issued by a history page is rejected
/// instead of silently resuming from an arbitrary position.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cursor(String);

const CURSOR_CONTEXT: &str = "docproof 2024-01 history cursor";
const CURSOR_TAG_LEN: usize = 4;

impl Cursor {
    /// Wrap a ledger paging token. Used by the history paginator.
    pub fn issue(paging_token: &str) -> Self {
        let mut raw = paging_token.as_bytes().to_vec();
        raw.extend_from_slice(&cursor_tag(paging_token.as_bytes()));
        Self(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Parse a token previously returned by [`Cursor::as_str`].
    pub fn parse(token: &str) -> Result<Self, ValidationError> {
        let cursor = Self(token.to_string());
        cursor.paging_token()?;
        Ok(cursor)
    }

    /// The ledger paging token this cursor resumes after.
    pub fn paging_token(&self) -> Result<String, ValidationError> {
        let raw = URL_SAFE_NO_PAD
            .decode(&self.0)
            .map_err(|_| ValidationError::InvalidCursor)?;
        if raw.len() <= CURSOR_TAG_LEN {
            return Err(ValidationError::InvalidCursor);
        }
        let (token, tag) = raw.split_at(raw.len() - CURSOR_TAG_LEN);
        if cursor_tag(token) != tag {
            return Err(ValidationError::InvalidCursor);
        }
        String::from_utf8(token.to_vec()).map_err(|_| ValidationError::InvalidCursor)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn cursor_tag(token: &[u8]) -> [u8; CURSOR_TAG_LEN] {
    let mut hasher = blake3::Hasher::new_derive_key(CURSOR_CONTEXT);
    hasher.update(token);
    let digest = hasher.finalize();
    let mut tag = [0u8; CURSOR_TAG_LEN];
    tag.copy_from_slice(&digest.as_bytes()[..CURSOR_TAG_LEN]);
    tag
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cursor({})", self.0)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Cursor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Cursor {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Cursor> for String {
    fn from(cursor: Cursor) -> Self {
        cursor.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_name_rules() {
        assert!(DocumentName::new("ContractV1").is_ok());
        assert!(DocumentName::new("a.b_c-d").is_ok());
        assert_eq!(DocumentName::new(""), Err(ValidationError::EmptyName));
        assert_eq!(
            DocumentName::new("has space"),
            Err(ValidationError::NameInvalidChar(' '))
        );
        assert!(DocumentName::new(&"x".repeat(MAX_NAME_LEN)).is_ok());
        assert!(matches!(
            DocumentName::new(&"x".repeat(MAX_NAME_LEN + 1)),
            Err(ValidationError::NameTooLong { len: 60, .. })
        ));
    }

    #[test]
    fn test_data_key_roundtrip() {
        let name = DocumentName::new("ContractV1").unwrap();
        assert_eq!(name.data_key(), "doc:ContractV1");
        assert_eq!(DocumentName::from_data_key("doc:ContractV1"), Some(name));
        assert_eq!(DocumentName::from_data_key("other:ContractV1"), None);
        assert_eq!(DocumentName::from_data_key("doc:"), None);
    }

    #[test]
    fn test_data_key_fits_ledger_limit() {
        let name = DocumentName::new(&"n".repeat(MAX_NAME_LEN)).unwrap();
        assert!(name.data_key().len() < 64);
    }

    #[test]
    fn test_partial_verdict() {
        let verdict = VerificationVerdict::partial(
            Address::new("GABC"),
            DocumentName::new("doc1").unwrap(),
        );
        assert!(verdict.is_verified);
        assert!(!verdict.is_complete());
        assert!(verdict.transaction_id.is_none());
    }

    #[test]
    fn test_verdict_serializes_camel_case() {
        let json = serde_json::to_value(VerificationVerdict::not_verified()).unwrap();
        assert_eq!(json["isVerified"], false);
        assert!(json.get("documentName").is_some());
    }

    #[test]
    fn test_cursor_roundtrip() {
        let cursor = Cursor::issue("123456789-1");
        let parsed = Cursor::parse(cursor.as_str()).unwrap();
        assert_eq!(parsed.paging_token().unwrap(), "123456789-1");
    }

    #[test]
    fn test_cursor_rejects_raw_paging_token() {
        assert_eq!(Cursor::parse("123456789"), Err(ValidationError::InvalidCursor));
        assert_eq!(Cursor::parse(""), Err(ValidationError::InvalidCursor));
    }

    proptest! {
        #[test]
        fn tampered_cursor_is_rejected(token in "[0-9]{1,20}", flip in 0usize..64) {
            let cursor = Cursor::issue(&token);
            let mut raw = URL_SAFE_NO_PAD.decode(cursor.as_str()).unwrap();
            let idx = flip % raw.len();
            raw[idx] ^= 0x01;
            let tampered = URL_SAFE_NO_PAD.encode(raw);
            prop_assert!(Cursor::parse(&tampered).is_err());
        }
    }
}
