//! Test doubles that inject failures into the ledger and wallet seams.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use docproof_core::{Address, TransactionId};
use docproof_ledger::{
    AccountSnapshot, KeypairWallet, Ledger, LedgerError, Operation, Result, SignedEnvelope,
    SubmitReceipt, TransactionEnvelope, TransactionQuery, TransactionSummary, Wallet, WalletError,
};

/// Take one pending failure, if any are left.
fn take_failure(pending: &AtomicUsize) -> bool {
    pending
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// A ledger that fails a scripted number of calls before delegating.
///
/// Injected failures are [`LedgerError::Unavailable`], the kind a dropped
/// connection produces.
pub struct FlakyLedger<L: Ledger> {
    inner: L,
    failing_submits: AtomicUsize,
    failing_operation_fetches: AtomicUsize,
    failing_queries: AtomicUsize,
    load_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl<L: Ledger> FlakyLedger<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            failing_submits: AtomicUsize::new(0),
            failing_operation_fetches: AtomicUsize::new(0),
            failing_queries: AtomicUsize::new(0),
            load_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Fail the next `n` submissions.
    pub fn fail_next_submits(&self, n: usize) {
        self.failing_submits.store(n, Ordering::SeqCst);
    }

    /// Fail every submission from now on.
    pub fn fail_all_submits(&self) {
        self.fail_next_submits(usize::MAX);
    }

    /// Fail the next `n` per-transaction operation fetches.
    pub fn fail_next_operation_fetches(&self, n: usize) {
        self.failing_operation_fetches.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` transaction stream queries.
    pub fn fail_next_queries(&self, n: usize) {
        self.failing_queries.store(n, Ordering::SeqCst);
    }

    /// Account loads that reached the ledger.
    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Submissions attempted, failed or not.
    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<L: Ledger> Ledger for FlakyLedger<L> {
    async fn load_account(&self, address: &Address) -> Result<AccountSnapshot> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.load_account(address).await
    }

    async fn submit(&self, envelope: &SignedEnvelope) -> Result<SubmitReceipt> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_submits) {
            return Err(LedgerError::Unavailable("injected submit failure".into()));
        }
        self.inner.submit(envelope).await
    }

    async fn query_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<TransactionSummary>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_queries) {
            return Err(LedgerError::Unavailable("injected query failure".into()));
        }
        self.inner.query_transactions(query).await
    }

    async fn transaction_operations(&self, id: &TransactionId) -> Result<Vec<Operation>> {
        if take_failure(&self.failing_operation_fetches) {
            return Err(LedgerError::Unavailable(format!(
                "injected failure fetching operations of {id}"
            )));
        }
        self.inner.transaction_operations(id).await
    }
}

/// A wallet whose user declines every signature request.
pub struct RejectingWallet {
    inner: KeypairWallet,
}

impl RejectingWallet {
    pub fn new(inner: KeypairWallet) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Wallet for RejectingWallet {
    async fn is_available(&self) -> bool {
        true
    }

    async fn address(&self) -> std::result::Result<Address, WalletError> {
        self.inner.address().await
    }

    async fn sign_transaction(
        &self,
        _envelope: &TransactionEnvelope,
        _network_passphrase: &str,
    ) -> std::result::Result<SignedEnvelope, WalletError> {
        Err(WalletError::UserRejected("user declined the signature request".into()))
    }
}

/// A wallet that is not installed.
#[derive(Debug, Default)]
pub struct UnavailableWallet;

#[async_trait]
impl Wallet for UnavailableWallet {
    async fn is_available(&self) -> bool {
        false
    }

    async fn address(&self) -> std::result::Result<Address, WalletError> {
        Err(WalletError::Unavailable)
    }

    async fn sign_transaction(
        &self,
        _envelope: &TransactionEnvelope,
        _network_passphrase: &str,
    ) -> std::result::Result<SignedEnvelope, WalletError> {
        Err(WalletError::Unavailable)
    }
}
