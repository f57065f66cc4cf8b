//! Transaction Orchestrator: turns "register this fingerprint under this
//! name" into a signed, submitted ledger transaction.
//!
//! Steps run strictly in order: validate, resolve the account, pre-flight
//! duplicate checks, then build, sign and submit under the retry policy.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use docproof_core::{
    Address, ContractError, DocumentName, FileFingerprint, TransactionId, ValidationError,
};
use docproof_ledger::{Ledger, LedgerError, TimeBounds, TransactionEnvelope, Wallet, WalletError};

use crate::backend::DocumentBackend;
use crate::cache::AccountCache;
use crate::error::{NotaryError, Result};
use crate::resolver::Resolver;
use crate::retry::{RetryDecision, RetryPolicy};

/// A registration request as a caller supplies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    /// Hex fingerprint; upper case is accepted.
    pub fingerprint: String,
    pub name: String,
    /// Registering account. Taken from the wallet when absent.
    pub address: Option<Address>,
    /// Overrides the configured retry budget.
    pub max_retries: Option<u32>,
}

impl RegisterRequest {
    pub fn new(fingerprint: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            name: name.into(),
            address: None,
            max_retries: None,
        }
    }

    pub fn address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Submission settings shared by every registration.
#[derive(Debug, Clone)]
pub struct SubmitSettings {
    pub network_passphrase: String,
    /// Validity window of each envelope.
    pub tx_timeout: Duration,
    pub retry: RetryPolicy,
}

/// Builds, signs and submits registrations.
pub struct Registrar<L: Ledger> {
    ledger: Arc<L>,
    cache: Arc<AccountCache<L>>,
    resolver: Arc<Resolver<L>>,
    backend: Arc<dyn DocumentBackend>,
    settings: SubmitSettings,
}

impl<L: Ledger> Registrar<L> {
    pub fn new(
        ledger: Arc<L>,
        cache: Arc<AccountCache<L>>,
        resolver: Arc<Resolver<L>>,
        backend: Arc<dyn DocumentBackend>,
        settings: SubmitSettings,
    ) -> Self {
        Self {
            ledger,
            cache,
            resolver,
            backend,
            settings,
        }
    }

    /// Register a fingerprint and return the confirmed transaction id.
    ///
    /// Validation and wallet failures are returned immediately. Network
    /// failures are retried with exponential backoff; the account cache is
    /// invalidated after every attempt so each retry signs with a fresh
    /// sequence number.
    pub async fn register(
        &self,
        wallet: &dyn Wallet,
        request: RegisterRequest,
    ) -> Result<TransactionId> {
        let fingerprint = FileFingerprint::from_hex(&request.fingerprint)?;
        let name = DocumentName::new(&request.name)?;

        if !wallet.is_available().await {
            return Err(WalletError::Unavailable.into());
        }
        let address = match request.address {
            Some(address) => address,
            None => wallet.address().await?,
        };

        self.preflight(&address, &fingerprint, &name).await?;

        let policy = RetryPolicy {
            max_retries: request.max_retries.unwrap_or(self.settings.retry.max_retries),
            ..self.settings.retry
        };

        let mut attempt = 0;
        loop {
            let outcome = self.attempt(wallet, &address, &fingerprint, &name).await;
            // Submitted or not, the sequence number may have moved.
            self.cache.invalidate(&address).await;

            let error = match outcome {
                Ok(tx_id) => {
                    info!(
                        address = %address,
                        name = %name,
                        tx_id = %tx_id,
                        attempts = attempt + 1,
                        backend = self.backend.kind(),
                        "document registered"
                    );
                    return Ok(tx_id);
                }
                Err(e) => e,
            };

            match policy.decide(&error, attempt) {
                RetryDecision::NotRetryable => return Err(error),
                RetryDecision::Retry(delay) => {
                    warn!(
                        address = %address,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "registration attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::Exhausted => {
                    warn!(address = %address, attempts = attempt + 1, error = %error, "registration failed");
                    return Err(NotaryError::Network {
                        message: format!("registration failed after {} attempts", attempt + 1),
                        source: match error {
                            NotaryError::Network { source, .. } => source,
                            _ => None,
                        },
                    });
                }
            }
        }
    }

    /// Refuse registrations that would duplicate or overwrite an existing one.
    async fn preflight(
        &self,
        address: &Address,
        fingerprint: &FileFingerprint,
        name: &DocumentName,
    ) -> Result<()> {
        let existing = self.resolver.verify_scoped(fingerprint, address).await?;
        if existing.is_verified && existing.document_name.as_ref() == Some(name) {
            debug!(address = %address, name = %name, "already registered, not submitting");
            return Err(ValidationError::AlreadyRegistered {
                fingerprint: fingerprint.to_string(),
                name: name.to_string(),
            }
            .into());
        }
        if self.resolver.name_in_use(address, name).await? {
            return Err(ValidationError::DuplicateName(name.to_string()).into());
        }
        Ok(())
    }

    /// Build, sign and submit once.
    async fn attempt(
        &self,
        wallet: &dyn Wallet,
        address: &Address,
        fingerprint: &FileFingerprint,
        name: &DocumentName,
    ) -> Result<TransactionId> {
        let snapshot = self.cache.get(address).await?;
        let operations = self
            .backend
            .registration_operations(address, fingerprint, name);
        let fee = self
            .backend
            .base_fee()
            .saturating_mul(operations.len() as u32);

        let envelope = TransactionEnvelope {
            source: address.clone(),
            sequence: snapshot.sequence + 1,
            fee,
            time_bounds: TimeBounds::from_now(Utc::now(), self.settings.tx_timeout.as_secs()),
            operations,
        };
        debug!(address = %address, sequence = envelope.sequence, fee, "signing registration");

        let signed = wallet
            .sign_transaction(&envelope, &self.settings.network_passphrase)
            .await?;
        let receipt = self
            .ledger
            .submit(&signed)
            .await
            .map_err(|e| submission_error(e, name))?;
        Ok(receipt.transaction_id)
    }
}

/// Translate a submission failure into the engine's taxonomy.
fn submission_error(error: LedgerError, name: &DocumentName) -> NotaryError {
    if error.is_entry_exists() {
        return ValidationError::DuplicateName(name.to_string()).into();
    }
    if let Some(code) = error.contract_code() {
        return ContractError::from_code(code).into();
    }
    NotaryError::network("transaction submission failed", error)
}
