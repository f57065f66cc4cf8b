//! Collaborator traits: the ledger the engine reads and writes, and the
//! wallet that holds keys and signs.
//!
//! The engine never touches keys or the network directly; it only talks
//! to implementations of these traits.

use std::sync::Arc;

use async_trait::async_trait;
use docproof_core::{Address, TransactionId};

use crate::envelope::{SignedEnvelope, TransactionEnvelope};
use crate::error::{Result, WalletError};
use crate::model::{AccountSnapshot, Operation, SubmitReceipt, TransactionQuery, TransactionSummary};

/// Ledger query and submission interface.
///
/// # Design Notes
///
/// - **404 semantics**: `load_account` returns [`LedgerError::NotFound`]
///   for an account that does not exist (never funded).
/// - **Ordering**: `query_transactions` returns summaries in the requested
///   order, resuming strictly after `cursor` when one is given.
/// - **Operations are fetched separately** per transaction, so a failure
///   on one transaction does not spoil a whole page.
///
/// [`LedgerError::NotFound`]: crate::LedgerError::NotFound
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Load the current state of an account.
    async fn load_account(&self, address: &Address) -> Result<AccountSnapshot>;

    /// Submit a signed transaction.
    async fn submit(&self, envelope: &SignedEnvelope) -> Result<SubmitReceipt>;

    /// Read a page of a transaction stream.
    async fn query_transactions(&self, query: &TransactionQuery)
        -> Result<Vec<TransactionSummary>>;

    /// Operations of a single transaction, in order.
    async fn transaction_operations(&self, id: &TransactionId) -> Result<Vec<Operation>>;
}

#[async_trait]
impl<L: Ledger + ?Sized> Ledger for Arc<L> {
    async fn load_account(&self, address: &Address) -> Result<AccountSnapshot> {
        (**self).load_account(address).await
    }

    async fn submit(&self, envelope: &SignedEnvelope) -> Result<SubmitReceipt> {
        (**self).submit(envelope).await
    }

    async fn query_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<TransactionSummary>> {
        (**self).query_transactions(query).await
    }

    async fn transaction_operations(&self, id: &TransactionId) -> Result<Vec<Operation>> {
        (**self).transaction_operations(id).await
    }
}

/// The signing side: an external wallet holding the user's keys.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Whether the wallet can be used at all (installed, unlocked).
    async fn is_available(&self) -> bool;

    /// The currently connected account.
    async fn address(&self) -> std::result::Result<Address, WalletError>;

    /// Sign an envelope for the network identified by `network_passphrase`.
    ///
    /// Returns [`WalletError::UserRejected`] when the user declines.
    async fn sign_transaction(
        &self,
        envelope: &TransactionEnvelope,
        network_passphrase: &str,
    ) -> std::result::Result<SignedEnvelope, WalletError>;
}
