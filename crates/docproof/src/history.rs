//! History Paginator: an account's registrations, newest first.
//!
//! Records are rebuilt from the account's transaction stream on every
//! call. Nothing is stored between pages except what the cursor carries.

use std::sync::Arc;

use tracing::{debug, warn};

use docproof_core::{Address, Cursor, DocumentRecord, HistoryPage, ValidationError};
use docproof_ledger::{Ledger, Operation, TransactionQuery, TransactionSummary, MAX_PAGE_LIMIT};

use crate::backend::DocumentBackend;
use crate::error::{NotaryError, Result};

/// Page size used when a caller does not choose one.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Reconstructs [`DocumentRecord`]s from a transaction stream.
pub struct HistoryPaginator<L: Ledger> {
    ledger: Arc<L>,
    backend: Arc<dyn DocumentBackend>,
}

impl<L: Ledger> HistoryPaginator<L> {
    pub fn new(ledger: Arc<L>, backend: Arc<dyn DocumentBackend>) -> Self {
        Self { ledger, backend }
    }

    /// One page of `address`'s registrations.
    ///
    /// `limit` bounds the number of transactions read, so a page holds at
    /// most `limit` records unless a single transaction registers several
    /// documents. `has_more` is set when the stream filled the page; the
    /// returned cursor resumes after the last transaction read.
    pub async fn history(
        &self,
        address: &Address,
        limit: usize,
        cursor: Option<&Cursor>,
    ) -> Result<HistoryPage> {
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(ValidationError::LimitOutOfRange {
                got: limit,
                max: MAX_PAGE_LIMIT,
            }
            .into());
        }
        let paging_token = cursor.map(Cursor::paging_token).transpose()?;

        let query = TransactionQuery::account(address.clone(), limit).after(paging_token);
        let transactions = self
            .ledger
            .query_transactions(&query)
            .await
            .map_err(|e| NotaryError::stream_query("transaction history", e))?;

        let mut records = Vec::new();
        for tx in &transactions {
            records.extend(self.records_in(tx).await);
        }

        let has_more = transactions.len() == limit;
        let next_cursor = if has_more {
            transactions.last().map(|tx| Cursor::issue(&tx.paging_token))
        } else {
            None
        };
        debug!(
            address = %address,
            transactions = transactions.len(),
            records = records.len(),
            has_more,
            "history page"
        );

        Ok(HistoryPage {
            records,
            has_more,
            next_cursor,
        })
    }

    /// Every registration `address` has made, newest first.
    pub async fn all_records(&self, address: &Address) -> Result<Vec<DocumentRecord>> {
        let mut records = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.history(address, MAX_PAGE_LIMIT, cursor.as_ref()).await?;
            records.extend(page.records);
            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => return Ok(records),
            }
        }
    }

    /// Newest record of `address` satisfying `matches`.
    ///
    /// Reads pages of `page_size` transactions, at most `max_pages` of them
    /// (`None` walks the whole stream). Failure to read the first page is
    /// an error; a later failure ends the search with what was seen.
    pub(crate) async fn find_record<F>(
        &self,
        address: &Address,
        page_size: usize,
        max_pages: Option<usize>,
        matches: F,
    ) -> Result<Option<DocumentRecord>>
    where
        F: Fn(&DocumentRecord) -> bool,
    {
        let mut cursor = None;
        let mut pages = 0;
        loop {
            let page = match self.history(address, page_size, cursor.as_ref()).await {
                Ok(page) => page,
                Err(e) if pages == 0 => return Err(e),
                Err(e) => {
                    warn!(address = %address, error = %e, "history scan ended early");
                    return Ok(None);
                }
            };
            pages += 1;

            if let Some(record) = page.records.into_iter().find(|r| matches(r)) {
                return Ok(Some(record));
            }
            let exhausted = max_pages.map(|max| pages >= max).unwrap_or(false);
            match page.next_cursor {
                Some(next) if page.has_more && !exhausted => cursor = Some(next),
                _ => return Ok(None),
            }
        }
    }

    /// Registrations carried by one transaction. Operation fetch failures
    /// skip the transaction.
    async fn records_in(&self, tx: &TransactionSummary) -> Vec<DocumentRecord> {
        if !tx.successful {
            return Vec::new();
        }
        match self.ledger.transaction_operations(&tx.id).await {
            Ok(operations) => records_from(self.backend.as_ref(), tx, &operations),
            Err(e) => {
                warn!(tx_id = %tx.id, error = %e, "skipping transaction: operations unavailable");
                Vec::new()
            }
        }
    }
}

/// One record per operation of `tx` that the backend recognizes.
pub(crate) fn records_from(
    backend: &dyn DocumentBackend,
    tx: &TransactionSummary,
    operations: &[Operation],
) -> Vec<DocumentRecord> {
    operations
        .iter()
        .filter_map(|op| {
            let registration = backend.decode_registration(op)?;
            let registrant = registration
                .registrant
                .or_else(|| op.source().cloned())
                .unwrap_or_else(|| tx.source.clone());
            Some(DocumentRecord {
                fingerprint: registration.fingerprint,
                name: registration.name,
                registrant,
                registered_at: tx.created_at,
                transaction_id: tx.id.clone(),
                ledger: tx.ledger,
            })
        })
        .collect()
}
