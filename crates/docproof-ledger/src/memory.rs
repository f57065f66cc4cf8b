//! In-memory implementation of the Ledger trait.
//!
//! This is primarily for testing. It enforces the same submission rules as
//! the network (signature, sequence number, validity window, fee, entry
//! immutability, contract checks) but keeps everything in memory and closes
//! one ledger per accepted transaction.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use docproof_core::{Address, Network, TransactionId, FINGERPRINT_HEX_LEN};

use crate::envelope::SignedEnvelope;
use crate::error::{codes, LedgerError, Result};
use crate::model::{
    AccountSnapshot, Operation, Order, SubmitReceipt, TransactionFilter, TransactionQuery,
    TransactionSummary, MAX_PAGE_LIMIT,
};
use crate::traits::Ledger;

/// Minimum fee per operation.
pub const BASE_FEE: u32 = 100;

/// Longest data entry key or value the ledger stores.
pub const MAX_DATA_LEN: usize = 64;

/// Function name of the registry contract's registration entry point.
pub const REGISTER_FUNCTION: &str = "register_document";

/// Close time of the first ledger.
const GENESIS_UNIX: i64 = 1_704_067_200;

/// In-memory ledger.
///
/// All data is lost when the ledger is dropped.
pub struct MemoryLedger {
    inner: RwLock<MemoryLedgerInner>,
    network_passphrase: String,
}

struct MemoryLedgerInner {
    accounts: HashMap<Address, AccountState>,

    /// Confirmed transactions, oldest first.
    transactions: Vec<StoredTransaction>,

    /// Contract storage: contract id -> document hash -> registration.
    contracts: HashMap<String, HashMap<String, ContractDocument>>,

    next_ledger: u32,

    /// Submission attempts, accepted or not.
    submissions: usize,
}

struct AccountState {
    sequence: u64,
    data: BTreeMap<String, Bytes>,
}

struct StoredTransaction {
    summary: TransactionSummary,
    operations: Vec<Operation>,
    participants: Vec<Address>,
}

struct ContractDocument {
    name: String,
    registrant: Address,
}

impl MemoryLedger {
    /// Create an empty ledger for the given network passphrase.
    pub fn new(network_passphrase: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(MemoryLedgerInner {
                accounts: HashMap::new(),
                transactions: Vec::new(),
                contracts: HashMap::new(),
                next_ledger: 1,
                submissions: 0,
            }),
            network_passphrase: network_passphrase.into(),
        }
    }

    pub fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    /// Create (fund) an account. Funding an existing account is a no-op.
    pub async fn fund(&self, address: &Address) {
        let mut inner = self.inner.write().await;
        let sequence = u64::from(inner.next_ledger) << 32;
        inner
            .accounts
            .entry(address.clone())
            .or_insert_with(|| AccountState {
                sequence,
                data: BTreeMap::new(),
            });
    }

    /// Write a data entry directly, without a transaction in history.
    pub async fn put_data_entry(&self, address: &Address, key: &str, value: &[u8]) -> Result<()> {
        let mut inner = self.inner.write().await;
        let account = inner
            .accounts
            .get_mut(address)
            .ok_or_else(|| LedgerError::NotFound(format!("account {address}")))?;
        account
            .data
            .insert(key.to_string(), Bytes::copy_from_slice(value));
        Ok(())
    }

    /// Record a confirmed transaction without signature or sequence checks.
    ///
    /// Lets tests populate the network with unrelated activity.
    pub async fn inject_transaction(
        &self,
        source: &Address,
        operations: Vec<Operation>,
    ) -> TransactionId {
        let mut inner = self.inner.write().await;
        let id = TransactionId::new(format!("injected-{:08}", inner.next_ledger));
        inner.close_ledger(id.clone(), source.clone(), operations);
        id
    }

    /// Number of `submit` calls seen so far.
    pub async fn submission_count(&self) -> usize {
        self.inner.read().await.submissions
    }

    /// Number of confirmed transactions.
    pub async fn transaction_count(&self) -> usize {
        self.inner.read().await.transactions.len()
    }

    /// Registrant and name a contract holds for `hash`.
    pub async fn contract_document(&self, contract: &str, hash: &str) -> Option<(Address, String)> {
        self.inner
            .read()
            .await
            .contracts
            .get(contract)
            .and_then(|docs| docs.get(hash))
            .map(|doc| (doc.registrant.clone(), doc.name.clone()))
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(Network::Testnet.default_passphrase())
    }
}

impl MemoryLedgerInner {
    fn close_ledger(
        &mut self,
        id: TransactionId,
        source: Address,
        operations: Vec<Operation>,
    ) -> u32 {
        let ledger = self.next_ledger;
        self.next_ledger += 1;

        let mut participants = vec![source.clone()];
        for op in &operations {
            if let Some(op_source) = op.source() {
                if !participants.contains(op_source) {
                    participants.push(op_source.clone());
                }
            }
        }

        let summary = TransactionSummary {
            id,
            source,
            created_at: ledger_close_time(ledger),
            ledger,
            paging_token: paging_token(ledger).to_string(),
            successful: true,
        };
        self.transactions.push(StoredTransaction {
            summary,
            operations,
            participants,
        });
        ledger
    }

    /// Check one operation against current state without changing it.
    fn check_operation(&self, tx_source: &Address, op: &Operation) -> Result<()> {
        match op {
            Operation::ManageData {
                source,
                name,
                value,
            } => {
                let target = source.as_ref().unwrap_or(tx_source);
                if target != tx_source {
                    return Err(LedgerError::rejected(codes::TX_BAD_AUTH, &[]));
                }
                if name.len() > MAX_DATA_LEN
                    || value.as_ref().map(|v| v.len() > MAX_DATA_LEN).unwrap_or(false)
                {
                    return Err(LedgerError::rejected(
                        codes::TX_FAILED,
                        &["op_malformed"],
                    ));
                }
                let exists = self
                    .accounts
                    .get(target)
                    .map(|a| a.data.contains_key(name))
                    .unwrap_or(false);
                if value.is_some() && exists {
                    return Err(LedgerError::rejected(
                        codes::TX_FAILED,
                        &[codes::OP_ALREADY_EXISTS],
                    ));
                }
                Ok(())
            }
            Operation::InvokeContract {
                contract,
                function,
                args,
                ..
            } => {
                if function != REGISTER_FUNCTION {
                    return Err(LedgerError::rejected(codes::TX_FAILED, &["op_no_function"]));
                }
                let [caller, hash, name] = args.as_slice() else {
                    return Err(LedgerError::rejected(codes::TX_FAILED, &["op_malformed"]));
                };
                if caller != tx_source.as_str() {
                    return Err(LedgerError::rejected(codes::TX_BAD_AUTH, &[]));
                }
                if hash.len() != FINGERPRINT_HEX_LEN {
                    return Err(LedgerError::ContractFailure { code: 1 });
                }
                if name.is_empty() || name.len() > MAX_DATA_LEN {
                    return Err(LedgerError::ContractFailure { code: 2 });
                }
                let exists = self
                    .contracts
                    .get(contract)
                    .map(|docs| docs.contains_key(hash))
                    .unwrap_or(false);
                if exists {
                    return Err(LedgerError::ContractFailure { code: 3 });
                }
                Ok(())
            }
            Operation::Other { .. } => Ok(()),
        }
    }

    fn apply_operation(&mut self, tx_source: &Address, op: &Operation) {
        match op {
            Operation::ManageData {
                source,
                name,
                value,
            } => {
                let target = source.as_ref().unwrap_or(tx_source);
                if let Some(account) = self.accounts.get_mut(target) {
                    match value {
                        Some(v) => {
                            account.data.insert(name.clone(), v.clone());
                        }
                        None => {
                            account.data.remove(name);
                        }
                    }
                }
            }
            Operation::InvokeContract { contract, args, .. } => {
                if let [caller, hash, name] = args.as_slice() {
                    self.contracts.entry(contract.clone()).or_default().insert(
                        hash.clone(),
                        ContractDocument {
                            name: name.clone(),
                            registrant: Address::new(caller.clone()),
                        },
                    );
                }
            }
            Operation::Other { .. } => {}
        }
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn load_account(&self, address: &Address) -> Result<AccountSnapshot> {
        let inner = self.inner.read().await;
        let account = inner
            .accounts
            .get(address)
            .ok_or_else(|| LedgerError::NotFound(format!("account {address}")))?;
        Ok(AccountSnapshot {
            address: address.clone(),
            sequence: account.sequence,
            data: account.data.clone(),
        })
    }

    async fn submit(&self, signed: &SignedEnvelope) -> Result<SubmitReceipt> {
        let mut inner = self.inner.write().await;
        inner.submissions += 1;

        let envelope = &signed.envelope;
        let source = &envelope.source;

        let Some(account) = inner.accounts.get(source) else {
            return Err(LedgerError::rejected(codes::TX_NO_SOURCE_ACCOUNT, &[]));
        };
        if !signed.is_signed_by(source, &self.network_passphrase) {
            return Err(LedgerError::rejected(codes::TX_BAD_AUTH, &[]));
        }
        if envelope.sequence != account.sequence + 1 {
            return Err(LedgerError::rejected(codes::TX_BAD_SEQ, &[]));
        }
        if !envelope.time_bounds.contains(Utc::now()) {
            return Err(LedgerError::rejected(codes::TX_TOO_LATE, &[]));
        }
        let min_fee = BASE_FEE.saturating_mul(envelope.operations.len() as u32);
        if envelope.fee < min_fee {
            return Err(LedgerError::rejected(codes::TX_INSUFFICIENT_FEE, &[]));
        }

        for op in &envelope.operations {
            inner.check_operation(source, op)?;
        }
        for op in &envelope.operations {
            inner.apply_operation(source, op);
        }
        if let Some(account) = inner.accounts.get_mut(source) {
            account.sequence = envelope.sequence;
        }

        let transaction_id = envelope.transaction_id(&self.network_passphrase)?;
        let ledger = inner.close_ledger(
            transaction_id.clone(),
            source.clone(),
            envelope.operations.clone(),
        );
        debug!(tx_id = %transaction_id, ledger, "memory ledger accepted transaction");

        Ok(SubmitReceipt {
            transaction_id,
            ledger,
        })
    }

    async fn query_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<TransactionSummary>> {
        if query.limit == 0 || query.limit > MAX_PAGE_LIMIT {
            return Err(LedgerError::BadRequest(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        let cursor = query
            .cursor
            .as_deref()
            .map(str::parse::<u64>)
            .transpose()
            .map_err(|_| LedgerError::BadRequest("invalid cursor".into()))?;

        let inner = self.inner.read().await;
        if let TransactionFilter::Account(address) = &query.filter {
            if !inner.accounts.contains_key(address) {
                return Err(LedgerError::NotFound(format!("account {address}")));
            }
        }

        let matches = |tx: &&StoredTransaction| match &query.filter {
            TransactionFilter::Account(address) => tx.participants.contains(address),
            TransactionFilter::Network => true,
        };
        let after_cursor = |tx: &&StoredTransaction| {
            let token = paging_token(tx.summary.ledger);
            match (cursor, query.order) {
                (None, _) => true,
                (Some(c), Order::Descending) => token < c,
                (Some(c), Order::Ascending) => token > c,
            }
        };

        let page: Vec<TransactionSummary> = match query.order {
            Order::Descending => inner
                .transactions
                .iter()
                .rev()
                .filter(matches)
                .filter(after_cursor)
                .take(query.limit)
                .map(|tx| tx.summary.clone())
                .collect(),
            Order::Ascending => inner
                .transactions
                .iter()
                .filter(matches)
                .filter(after_cursor)
                .take(query.limit)
                .map(|tx| tx.summary.clone())
                .collect(),
        };
        Ok(page)
    }

    async fn transaction_operations(&self, id: &TransactionId) -> Result<Vec<Operation>> {
        let inner = self.inner.read().await;
        inner
            .transactions
            .iter()
            .find(|tx| &tx.summary.id == id)
            .map(|tx| tx.operations.clone())
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))
    }
}

fn paging_token(ledger: u32) -> u64 {
    u64::from(ledger) << 12
}

fn ledger_close_time(ledger: u32) -> DateTime<Utc> {
    let genesis = DateTime::<Utc>::from_timestamp(GENESIS_UNIX, 0).unwrap_or_default();
    genesis + Duration::seconds(5 * i64::from(ledger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{DecoratedSignature, TimeBounds, TransactionEnvelope};
    use docproof_core::Keypair;

    fn manage_data(name: &str, value: &[u8]) -> Operation {
        Operation::ManageData {
            source: None,
            name: name.into(),
            value: Some(Bytes::copy_from_slice(value)),
        }
    }

    fn signed(
        ledger: &MemoryLedger,
        keypair: &Keypair,
        sequence: u64,
        operations: Vec<Operation>,
    ) -> SignedEnvelope {
        let envelope = TransactionEnvelope {
            source: keypair.address(),
            sequence,
            fee: BASE_FEE * operations.len().max(1) as u32,
            time_bounds: TimeBounds::from_now(Utc::now(), 60),
            operations,
        };
        let payload = envelope
            .signature_payload(ledger.network_passphrase())
            .unwrap();
        SignedEnvelope {
            signatures: vec![DecoratedSignature::new(
                keypair.public_key(),
                keypair.sign(&payload),
            )],
            envelope,
        }
    }

    #[tokio::test]
    async fn test_unknown_account_not_found() {
        let ledger = MemoryLedger::default();
        let result = ledger.load_account(&Address::new("GNOPE")).await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_submit_applies_data_entry() {
        let ledger = MemoryLedger::default();
        let keypair = Keypair::from_seed(&[0x01; 32]);
        ledger.fund(&keypair.address()).await;
        let seq = ledger.load_account(&keypair.address()).await.unwrap().sequence;

        let receipt = ledger
            .submit(&signed(&ledger, &keypair, seq + 1, vec![manage_data("doc:a", b"v")]))
            .await
            .unwrap();
        assert_eq!(receipt.transaction_id.as_str().len(), 64);

        let snapshot = ledger.load_account(&keypair.address()).await.unwrap();
        assert_eq!(snapshot.sequence, seq + 1);
        assert_eq!(snapshot.data.get("doc:a").unwrap().as_ref(), b"v");
    }

    #[tokio::test]
    async fn test_rejects_bad_sequence() {
        let ledger = MemoryLedger::default();
        let keypair = Keypair::from_seed(&[0x01; 32]);
        ledger.fund(&keypair.address()).await;
        let seq = ledger.load_account(&keypair.address()).await.unwrap().sequence;

        let result = ledger
            .submit(&signed(&ledger, &keypair, seq + 5, vec![manage_data("doc:a", b"v")]))
            .await;
        assert!(matches!(
            result,
            Err(LedgerError::Rejected { ref code, .. }) if code == codes::TX_BAD_SEQ
        ));
        assert_eq!(ledger.submission_count().await, 1);
        assert_eq!(ledger.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_rejects_wrong_signer() {
        let ledger = MemoryLedger::default();
        let owner = Keypair::from_seed(&[0x01; 32]);
        let intruder = Keypair::from_seed(&[0x02; 32]);
        ledger.fund(&owner.address()).await;
        let seq = ledger.load_account(&owner.address()).await.unwrap().sequence;

        let mut envelope = signed(&ledger, &intruder, seq + 1, vec![manage_data("doc:a", b"v")]);
        envelope.envelope.source = owner.address();
        let result = ledger.submit(&envelope).await;
        assert!(matches!(
            result,
            Err(LedgerError::Rejected { ref code, .. }) if code == codes::TX_BAD_AUTH
        ));
    }

    #[tokio::test]
    async fn test_existing_entry_is_immutable() {
        let ledger = MemoryLedger::default();
        let keypair = Keypair::from_seed(&[0x01; 32]);
        ledger.fund(&keypair.address()).await;
        let seq = ledger.load_account(&keypair.address()).await.unwrap().sequence;

        ledger
            .submit(&signed(&ledger, &keypair, seq + 1, vec![manage_data("doc:a", b"v1")]))
            .await
            .unwrap();
        let err = ledger
            .submit(&signed(&ledger, &keypair, seq + 2, vec![manage_data("doc:a", b"v2")]))
            .await
            .unwrap_err();
        assert!(err.is_entry_exists());
    }

    #[tokio::test]
    async fn test_contract_duplicate_rejected() {
        let ledger = MemoryLedger::default();
        let keypair = Keypair::from_seed(&[0x01; 32]);
        ledger.fund(&keypair.address()).await;
        let seq = ledger.load_account(&keypair.address()).await.unwrap().sequence;
        let hash = "a".repeat(64);
        let invoke = |name: &str| Operation::InvokeContract {
            source: None,
            contract: "CREGISTRY".into(),
            function: REGISTER_FUNCTION.into(),
            args: vec![keypair.address().to_string(), hash.clone(), name.into()],
        };

        ledger
            .submit(&signed(&ledger, &keypair, seq + 1, vec![invoke("first")]))
            .await
            .unwrap();
        let (registrant, name) = ledger.contract_document("CREGISTRY", &hash).await.unwrap();
        assert_eq!(registrant, keypair.address());
        assert_eq!(name, "first");

        let err = ledger
            .submit(&signed(&ledger, &keypair, seq + 2, vec![invoke("second")]))
            .await
            .unwrap_err();
        assert_eq!(err.contract_code(), Some(3));
    }

    #[tokio::test]
    async fn test_query_newest_first_with_cursor() {
        let ledger = MemoryLedger::default();
        let source = Address::new("GSOURCE");
        ledger.fund(&source).await;
        for i in 0..5 {
            ledger
                .inject_transaction(&source, vec![Operation::Other { kind: format!("op{i}") }])
                .await;
        }

        let first = ledger
            .query_transactions(&TransactionQuery::account(source.clone(), 3))
            .await
            .unwrap();
        assert_eq!(first.len(), 3);
        assert!(first[0].created_at > first[1].created_at);

        let rest = ledger
            .query_transactions(
                &TransactionQuery::account(source, 3)
                    .after(Some(first[2].paging_token.clone())),
            )
            .await
            .unwrap();
        assert_eq!(rest.len(), 2);
        assert!(rest[0].created_at < first[2].created_at);
    }

    #[tokio::test]
    async fn test_query_limit_bounds() {
        let ledger = MemoryLedger::default();
        let result = ledger
            .query_transactions(&TransactionQuery::network(MAX_PAGE_LIMIT + 1))
            .await;
        assert!(matches!(result, Err(LedgerError::BadRequest(_))));
    }
}
