//! Lookup Resolver: is a fingerprint registered, and by whom.
//!
//! Two strategies:
//!
//! - **scoped**: the account is known. Its current state is read through
//!   the [`AccountCache`], then history recovers the full record.
//! - **broad**: no account is known. A bounded window of the most recent
//!   network-wide transactions is scanned, newest first. This is a
//!   best-effort, recency-biased search; a registration older than the
//!   window reports as not verified.

use std::sync::Arc;

use tracing::{debug, info, warn};

use docproof_core::{Address, DocumentName, FileFingerprint, VerificationVerdict};
use docproof_ledger::{Ledger, TransactionQuery, MAX_PAGE_LIMIT};

use crate::backend::{DocumentBackend, Indexed};
use crate::cache::AccountCache;
use crate::error::{NotaryError, Result};
use crate::history::{records_from, HistoryPaginator};

/// Resolver tunables.
#[derive(Debug, Clone, Copy)]
pub struct ResolverLimits {
    /// Transactions inspected by a broad lookup.
    pub broad_search_window: usize,
    /// Page size of history cross-references.
    pub history_scan_limit: usize,
}

impl Default for ResolverLimits {
    fn default() -> Self {
        Self {
            broad_search_window: 200,
            history_scan_limit: MAX_PAGE_LIMIT,
        }
    }
}

/// Answers verification and name queries.
pub struct Resolver<L: Ledger> {
    ledger: Arc<L>,
    cache: Arc<AccountCache<L>>,
    history: Arc<HistoryPaginator<L>>,
    backend: Arc<dyn DocumentBackend>,
    limits: ResolverLimits,
}

impl<L: Ledger> Resolver<L> {
    pub fn new(
        ledger: Arc<L>,
        cache: Arc<AccountCache<L>>,
        history: Arc<HistoryPaginator<L>>,
        backend: Arc<dyn DocumentBackend>,
        limits: ResolverLimits,
    ) -> Self {
        Self {
            ledger,
            cache,
            history,
            backend,
            limits,
        }
    }

    /// Verify `fingerprint`, scoped to `address` when one is given.
    pub async fn verify(
        &self,
        fingerprint: &FileFingerprint,
        address: Option<&Address>,
    ) -> Result<VerificationVerdict> {
        let verdict = match address {
            Some(address) => self.verify_scoped(fingerprint, address).await?,
            None => self.verify_broad(fingerprint).await?,
        };
        info!(
            fingerprint = %fingerprint,
            scoped = address.is_some(),
            verified = verdict.is_verified,
            "verification complete"
        );
        Ok(verdict)
    }

    /// Look `fingerprint` up among `address`'s registrations.
    pub async fn verify_scoped(
        &self,
        fingerprint: &FileFingerprint,
        address: &Address,
    ) -> Result<VerificationVerdict> {
        let snapshot = self.cache.get(address).await?;

        match self.backend.find_fingerprint(&snapshot, fingerprint) {
            Indexed::Missing => Ok(VerificationVerdict::not_verified()),
            Indexed::Found(name) => {
                let lookup = self
                    .history
                    .find_record(address, self.limits.history_scan_limit, Some(1), |r| {
                        &r.fingerprint == fingerprint && r.name == name
                    })
                    .await;
                match lookup {
                    Ok(Some(record)) => Ok(VerificationVerdict::from_record(&record)),
                    Ok(None) => {
                        debug!(address = %address, name = %name, "data entry has no history record yet");
                        Ok(VerificationVerdict::partial(address.clone(), name))
                    }
                    Err(e) => {
                        warn!(address = %address, error = %e, "history cross-reference failed");
                        Ok(VerificationVerdict::partial(address.clone(), name))
                    }
                }
            }
            Indexed::NotIndexed => {
                let record = self
                    .history
                    .find_record(address, self.limits.history_scan_limit, None, |r| {
                        &r.fingerprint == fingerprint
                    })
                    .await?;
                Ok(record
                    .map(|r| VerificationVerdict::from_record(&r))
                    .unwrap_or_else(VerificationVerdict::not_verified))
            }
        }
    }

    /// Scan the most recent network transactions for `fingerprint`.
    ///
    /// Only the newest `broad_search_window` transactions are inspected.
    /// A failure of the first query is an error; later page failures end
    /// the scan and per-transaction failures are skipped.
    pub async fn verify_broad(&self, fingerprint: &FileFingerprint) -> Result<VerificationVerdict> {
        let mut remaining = self.limits.broad_search_window;
        let mut cursor: Option<String> = None;
        let mut first = true;

        while remaining > 0 {
            let limit = remaining.min(MAX_PAGE_LIMIT);
            let query = TransactionQuery::network(limit).after(cursor.take());
            let transactions = match self.ledger.query_transactions(&query).await {
                Ok(page) => page,
                Err(e) if first => {
                    return Err(NotaryError::stream_query("network transactions", e));
                }
                Err(e) => {
                    warn!(error = %e, "broad search ended early");
                    break;
                }
            };
            first = false;

            for tx in transactions.iter().filter(|tx| tx.successful) {
                let operations = match self.ledger.transaction_operations(&tx.id).await {
                    Ok(ops) => ops,
                    Err(e) => {
                        warn!(tx_id = %tx.id, error = %e, "skipping transaction in broad search");
                        continue;
                    }
                };
                if let Some(record) = records_from(self.backend.as_ref(), tx, &operations)
                    .into_iter()
                    .find(|r| &r.fingerprint == fingerprint)
                {
                    return Ok(VerificationVerdict::from_record(&record));
                }
            }

            remaining = remaining.saturating_sub(transactions.len());
            if transactions.len() < limit {
                break;
            }
            cursor = transactions.last().map(|tx| tx.paging_token.clone());
        }

        debug!(fingerprint = %fingerprint, "not found in broad search window");
        Ok(VerificationVerdict::not_verified())
    }

    /// The document `address` registered under `name`.
    pub async fn find_by_name(
        &self,
        address: &Address,
        name: &DocumentName,
    ) -> Result<VerificationVerdict> {
        let snapshot = self.cache.get(address).await?;

        match self.backend.find_name(&snapshot, name) {
            Indexed::Missing => Ok(VerificationVerdict::not_verified()),
            Indexed::Found(fingerprint) => {
                let lookup = self
                    .history
                    .find_record(address, self.limits.history_scan_limit, Some(1), |r| {
                        &r.name == name && r.fingerprint == fingerprint
                    })
                    .await;
                match lookup {
                    Ok(Some(record)) => Ok(VerificationVerdict::from_record(&record)),
                    Ok(None) => Ok(VerificationVerdict::partial(address.clone(), name.clone())),
                    Err(e) => {
                        warn!(address = %address, error = %e, "history cross-reference failed");
                        Ok(VerificationVerdict::partial(address.clone(), name.clone()))
                    }
                }
            }
            Indexed::NotIndexed => {
                let record = self
                    .history
                    .find_record(address, self.limits.history_scan_limit, None, |r| {
                        &r.name == name
                    })
                    .await?;
                Ok(record
                    .map(|r| VerificationVerdict::from_record(&r))
                    .unwrap_or_else(VerificationVerdict::not_verified))
            }
        }
    }

    /// Whether `address` already holds a document under `name`.
    pub async fn name_in_use(&self, address: &Address, name: &DocumentName) -> Result<bool> {
        let snapshot = self.cache.get(address).await?;
        match self.backend.find_name(&snapshot, name) {
            Indexed::Found(_) => Ok(true),
            Indexed::Missing => Ok(false),
            Indexed::NotIndexed => {
                // A key that is present but undecodable is still taken.
                if snapshot.data.contains_key(&name.data_key()) {
                    return Ok(true);
                }
                let record = self
                    .history
                    .find_record(address, self.limits.history_scan_limit, None, |r| {
                        &r.name == name
                    })
                    .await?;
                Ok(record.is_some())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;

    use docproof_ledger::{MemoryLedger, Operation};

    use crate::backend::{ContractBackend, DataEntryBackend};

    struct Setup {
        ledger: Arc<MemoryLedger>,
        resolver: Resolver<MemoryLedger>,
    }

    fn setup_with(backend: Arc<dyn DocumentBackend>, limits: ResolverLimits) -> Setup {
        let ledger = Arc::new(MemoryLedger::default());
        let cache = Arc::new(AccountCache::new(ledger.clone(), Duration::ZERO));
        let history = Arc::new(HistoryPaginator::new(ledger.clone(), backend.clone()));
        let resolver = Resolver::new(ledger.clone(), cache, history, backend, limits);
        Setup { ledger, resolver }
    }

    fn setup() -> Setup {
        setup_with(Arc::new(DataEntryBackend::new(100)), ResolverLimits::default())
    }

    fn manage_data(name: &str, fingerprint: &FileFingerprint) -> Operation {
        Operation::ManageData {
            source: None,
            name: DocumentName::new(name).unwrap().data_key(),
            value: Some(Bytes::copy_from_slice(fingerprint.as_ledger_value())),
        }
    }

    #[tokio::test]
    async fn test_scoped_missing_is_not_verified() {
        let s = setup();
        let address = Address::new("GOWNER");
        s.ledger.fund(&address).await;

        let verdict = s
            .resolver
            .verify(&FileFingerprint::of_bytes(b"never"), Some(&address))
            .await
            .unwrap();
        assert_eq!(verdict, VerificationVerdict::not_verified());
    }

    #[tokio::test]
    async fn test_scoped_partial_when_history_lags() {
        let s = setup();
        let address = Address::new("GOWNER");
        let fingerprint = FileFingerprint::of_bytes(b"lagging");
        s.ledger.fund(&address).await;
        s.ledger
            .put_data_entry(&address, "doc:lagging", fingerprint.as_ledger_value())
            .await
            .unwrap();

        let verdict = s.resolver.verify(&fingerprint, Some(&address)).await.unwrap();
        assert!(verdict.is_verified);
        assert!(!verdict.is_complete());
        assert_eq!(verdict.registered_by, Some(address));
        assert_eq!(verdict.document_name.unwrap().as_str(), "lagging");
    }

    #[tokio::test]
    async fn test_broad_finds_recent_registration() {
        let s = setup();
        let owner = Address::new("GOWNER");
        let fingerprint = FileFingerprint::of_bytes(b"broad");
        s.ledger
            .inject_transaction(&owner, vec![manage_data("deed", &fingerprint)])
            .await;
        for _ in 0..3 {
            s.ledger
                .inject_transaction(&Address::new("GNOISE"), vec![Operation::Other { kind: "payment".into() }])
                .await;
        }

        let verdict = s.resolver.verify(&fingerprint, None).await.unwrap();
        assert!(verdict.is_complete());
        assert_eq!(verdict.registered_by, Some(owner));
        assert_eq!(verdict.document_name.unwrap().as_str(), "deed");
    }

    #[tokio::test]
    async fn test_broad_window_is_bounded() {
        let s = setup_with(
            Arc::new(DataEntryBackend::new(100)),
            ResolverLimits {
                broad_search_window: 2,
                history_scan_limit: 20,
            },
        );
        let fingerprint = FileFingerprint::of_bytes(b"old");
        s.ledger
            .inject_transaction(&Address::new("GOWNER"), vec![manage_data("old", &fingerprint)])
            .await;
        for _ in 0..2 {
            s.ledger
                .inject_transaction(&Address::new("GNOISE"), vec![Operation::Other { kind: "payment".into() }])
                .await;
        }

        let verdict = s.resolver.verify(&fingerprint, None).await.unwrap();
        assert!(!verdict.is_verified);
    }

    #[tokio::test]
    async fn test_contract_backend_resolves_through_history() {
        let s = setup_with(
            Arc::new(ContractBackend::new("CREGISTRY", 100)),
            ResolverLimits::default(),
        );
        let owner = Address::new("GOWNER");
        let fingerprint = FileFingerprint::of_bytes(b"contract doc");
        s.ledger.fund(&owner).await;
        s.ledger
            .inject_transaction(
                &owner,
                vec![Operation::InvokeContract {
                    source: None,
                    contract: "CREGISTRY".into(),
                    function: docproof_ledger::REGISTER_FUNCTION.into(),
                    args: vec![owner.to_string(), fingerprint.to_string(), "lease".into()],
                }],
            )
            .await;

        let verdict = s.resolver.verify(&fingerprint, Some(&owner)).await.unwrap();
        assert!(verdict.is_complete());

        let name = DocumentName::new("lease").unwrap();
        assert!(s.resolver.name_in_use(&owner, &name).await.unwrap());
        let by_name = s.resolver.find_by_name(&owner, &name).await.unwrap();
        assert_eq!(by_name.transaction_id, verdict.transaction_id);
    }

    #[tokio::test]
    async fn test_scoped_unknown_account_is_network_error() {
        let s = setup();
        let err = s
            .resolver
            .verify(&FileFingerprint::of_bytes(b"x"), Some(&Address::new("GNOBODY")))
            .await
            .unwrap_err();
        assert!(err.is_network());
    }
}
