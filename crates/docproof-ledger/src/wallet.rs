//! A wallet backed by a local keypair.
//!
//! Used for tests, demos and headless tooling. Browser wallets implement
//! [`Wallet`] on their own side.

use async_trait::async_trait;
use tracing::debug;

use docproof_core::{Address, Keypair};

use crate::envelope::{DecoratedSignature, SignedEnvelope, TransactionEnvelope};
use crate::error::WalletError;
use crate::traits::Wallet;

/// Signs with an in-process Ed25519 keypair.
#[derive(Debug, Clone)]
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn generate() -> Self {
        Self::new(Keypair::generate())
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

#[async_trait]
impl Wallet for KeypairWallet {
    async fn is_available(&self) -> bool {
        true
    }

    async fn address(&self) -> Result<Address, WalletError> {
        Ok(self.keypair.address())
    }

    async fn sign_transaction(
        &self,
        envelope: &TransactionEnvelope,
        network_passphrase: &str,
    ) -> Result<SignedEnvelope, WalletError> {
        if envelope.source != self.keypair.address() {
            return Err(WalletError::Signing(format!(
                "envelope source {} is not controlled by this wallet",
                envelope.source
            )));
        }

        let payload = envelope
            .signature_payload(network_passphrase)
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        let signature = self.keypair.sign(&payload);
        debug!(source = %envelope.source, sequence = envelope.sequence, "signed envelope");

        Ok(SignedEnvelope {
            envelope: envelope.clone(),
            signatures: vec![DecoratedSignature::new(self.keypair.public_key(), signature)],
        })
    }
}
