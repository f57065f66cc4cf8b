//! Proptest generators for property-based testing.

use proptest::prelude::*;

use docproof_core::{DocumentName, FileFingerprint, Keypair, MAX_NAME_LEN};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a name that passes validation.
pub fn document_name() -> impl Strategy<Value = DocumentName> {
    proptest::string::string_regex(&format!("[A-Za-z0-9._-]{{1,{MAX_NAME_LEN}}}"))
        .expect("valid regex")
        .prop_filter_map("name rejected", |s| DocumentName::new(&s).ok())
}

/// Generate a name that fails validation: too long or with a bad character.
pub fn invalid_document_name() -> impl Strategy<Value = String> {
    prop_oneof![
        proptest::string::string_regex(&format!("[a-z]{{{},{}}}", MAX_NAME_LEN + 1, MAX_NAME_LEN + 20))
            .expect("valid regex"),
        "[a-z]{0,10}[ /:@#!][a-z]{0,10}",
    ]
}

/// Generate non-empty file content up to `max_len` bytes.
pub fn file_content(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=max_len.max(1))
}

/// Generate a fingerprint of random content.
pub fn fingerprint() -> impl Strategy<Value = FileFingerprint> {
    any::<[u8; 32]>().prop_map(FileFingerprint::from_digest)
}

/// Generate a fingerprint string with a length other than 64.
pub fn wrong_length_hex() -> impl Strategy<Value = String> {
    prop_oneof!["[0-9a-f]{0,63}", "[0-9a-f]{65,80}"]
}

/// Generate a window size for chunked hashing.
pub fn chunk_size() -> impl Strategy<Value = usize> {
    prop_oneof![1usize..64, 64usize..4096, Just(1024 * 1024)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use docproof_core::ValidationError;

    proptest! {
        #[test]
        fn generated_names_fit_data_key(name in document_name()) {
            prop_assert!(name.data_key().len() < 64);
        }

        #[test]
        fn invalid_names_are_rejected(name in invalid_document_name()) {
            prop_assert!(DocumentName::new(&name).is_err());
        }

        #[test]
        fn wrong_length_fingerprints_are_rejected(hex in wrong_length_hex()) {
            prop_assert_eq!(
                FileFingerprint::from_hex(&hex),
                Err(ValidationError::FingerprintLength(hex.len()))
            );
        }

        #[test]
        fn fingerprint_hex_roundtrip(fp in fingerprint()) {
            prop_assert_eq!(FileFingerprint::from_hex(fp.as_str()), Ok(fp.clone()));
        }
    }
}
