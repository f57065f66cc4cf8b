//! Transaction envelopes and their canonical encoding.
//!
//! An envelope is encoded with CBOR (serde field order, definite lengths)
//! so the same envelope always produces the same bytes. Signers sign
//! `SHA-256(network_id || canonical_bytes)` where
//! `network_id = SHA-256(passphrase)`; the transaction id is the hex of
//! that same digest.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docproof_core::{sha256, Address, Ed25519PublicKey, Ed25519Signature, TransactionId};

use crate::error::{LedgerError, Result};
use crate::model::Operation;

/// Validity window of a transaction, in Unix seconds (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub min_time: i64,
    pub max_time: i64,
}

impl TimeBounds {
    /// Window from `now` until `now + timeout_secs`.
    pub fn from_now(now: DateTime<Utc>, timeout_secs: u64) -> Self {
        let start = now.timestamp();
        Self {
            min_time: start,
            max_time: start.saturating_add(timeout_secs as i64),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let t = at.timestamp();
        t >= self.min_time && t <= self.max_time
    }
}

/// An unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub source: Address,
    pub sequence: u64,
    pub fee: u32,
    pub time_bounds: TimeBounds,
    pub operations: Vec<Operation>,
}

impl TransactionEnvelope {
    /// Deterministic CBOR encoding of the envelope.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| LedgerError::Decode(format!("envelope encoding failed: {e}")))?;
        Ok(buf)
    }

    /// The 32-byte digest a signer signs for the given network.
    pub fn signature_payload(&self, network_passphrase: &str) -> Result<[u8; 32]> {
        let mut buf = sha256(network_passphrase.as_bytes()).to_vec();
        buf.extend_from_slice(&self.canonical_bytes()?);
        Ok(sha256(&buf))
    }

    /// Transaction id the ledger will assign to this envelope.
    pub fn transaction_id(&self, network_passphrase: &str) -> Result<TransactionId> {
        Ok(TransactionId::new(hex::encode(
            self.signature_payload(network_passphrase)?,
        )))
    }
}

/// A signature together with the key that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedSignature {
    pub public_key: Ed25519PublicKey,
    pub signature: Bytes,
}

impl DecoratedSignature {
    pub fn new(public_key: Ed25519PublicKey, signature: Ed25519Signature) -> Self {
        Self {
            public_key,
            signature: Bytes::copy_from_slice(signature.as_bytes()),
        }
    }

    pub fn verify(&self, payload: &[u8]) -> bool {
        Ed25519Signature::from_slice(&self.signature)
            .map(|sig| self.public_key.verify(payload, &sig))
            .unwrap_or(false)
    }
}

/// An envelope ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub envelope: TransactionEnvelope,
    pub signatures: Vec<DecoratedSignature>,
}

impl SignedEnvelope {
    /// Whether some signature was made by `address` over this envelope.
    pub fn is_signed_by(&self, address: &Address, network_passphrase: &str) -> bool {
        let Some(key) = Ed25519PublicKey::from_address(address) else {
            return false;
        };
        let Ok(payload) = self.envelope.signature_payload(network_passphrase) else {
            return false;
        };
        self.signatures
            .iter()
            .any(|sig| sig.public_key == key && sig.verify(&payload))
    }

    /// Base64 wire form used for submission.
    pub fn to_base64(&self) -> Result<String> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| LedgerError::Decode(format!("envelope encoding failed: {e}")))?;
        Ok(STANDARD.encode(buf))
    }

    pub fn from_base64(s: &str) -> Result<Self> {
        let raw = STANDARD
            .decode(s)
            .map_err(|e| LedgerError::Decode(format!("invalid base64 envelope: {e}")))?;
        ciborium::from_reader(raw.as_slice())
            .map_err(|e| LedgerError::Decode(format!("invalid envelope: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docproof_core::Keypair;

    const PASSPHRASE: &str = "Test SDF Network ; September 2015";

    fn envelope(keypair: &Keypair, sequence: u64) -> TransactionEnvelope {
        TransactionEnvelope {
            source: keypair.address(),
            sequence,
            fee: 100,
            time_bounds: TimeBounds {
                min_time: 1_700_000_000,
                max_time: 1_700_000_060,
            },
            operations: vec![Operation::ManageData {
                source: None,
                name: "doc:ContractV1".into(),
                value: Some(Bytes::from_static(b"abc")),
            }],
        }
    }

    fn sign(keypair: &Keypair, envelope: TransactionEnvelope) -> SignedEnvelope {
        let payload = envelope.signature_payload(PASSPHRASE).unwrap();
        SignedEnvelope {
            signatures: vec![DecoratedSignature::new(
                keypair.public_key(),
                keypair.sign(&payload),
            )],
            envelope,
        }
    }

    #[test]
    fn test_canonical_bytes_deterministic() {
        let keypair = Keypair::from_seed(&[0x11; 32]);
        let a = envelope(&keypair, 7).canonical_bytes().unwrap();
        let b = envelope(&keypair, 7).canonical_bytes().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, envelope(&keypair, 8).canonical_bytes().unwrap());
    }

    #[test]
    fn test_transaction_id_depends_on_network() {
        let keypair = Keypair::from_seed(&[0x11; 32]);
        let env = envelope(&keypair, 7);
        let test_id = env.transaction_id(PASSPHRASE).unwrap();
        let main_id = env
            .transaction_id("Public Global Stellar Network ; September 2015")
            .unwrap();
        assert_eq!(test_id.as_str().len(), 64);
        assert_ne!(test_id, main_id);
    }

    #[test]
    fn test_signature_check() {
        let keypair = Keypair::from_seed(&[0x11; 32]);
        let other = Keypair::from_seed(&[0x22; 32]);
        let signed = sign(&keypair, envelope(&keypair, 7));

        assert!(signed.is_signed_by(&keypair.address(), PASSPHRASE));
        assert!(!signed.is_signed_by(&other.address(), PASSPHRASE));
        assert!(!signed.is_signed_by(&keypair.address(), "Other Network"));
    }

    #[test]
    fn test_base64_wire_form() {
        let keypair = Keypair::from_seed(&[0x11; 32]);
        let signed = sign(&keypair, envelope(&keypair, 7));
        let wire = signed.to_base64().unwrap();
        assert_eq!(SignedEnvelope::from_base64(&wire).unwrap(), signed);
        assert!(SignedEnvelope::from_base64("not base64!").is_err());
    }

    #[test]
    fn test_time_bounds() {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let bounds = TimeBounds::from_now(now, 30);
        assert!(bounds.contains(now));
        assert!(!bounds.contains(now + chrono::Duration::seconds(31)));
    }
}
