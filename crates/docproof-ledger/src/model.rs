//! Ledger data model: account snapshots, operations and transaction
//! summaries as the engine sees them.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docproof_core::{Address, TransactionId};

/// Largest page the ledger will return for a transaction query.
pub const MAX_PAGE_LIMIT: usize = 200;

/// Point-in-time view of a ledger account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub address: Address,
    /// Current sequence number; the next transaction must use `sequence + 1`.
    pub sequence: u64,
    /// Raw data entries, values already decoded from their wire encoding.
    pub data: BTreeMap<String, Bytes>,
}

impl AccountSnapshot {
    pub fn new(address: Address, sequence: u64) -> Self {
        Self {
            address,
            sequence,
            data: BTreeMap::new(),
        }
    }

    /// Data entries whose key starts with `prefix`.
    pub fn entries_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Bytes)> + 'a {
        self.data
            .range(prefix.to_string()..)
            .take_while(move |(key, _)| key.starts_with(prefix))
    }
}

/// A single ledger operation inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Set (or, with no value, delete) a data entry on the source account.
    ManageData {
        source: Option<Address>,
        name: String,
        value: Option<Bytes>,
    },
    /// Call a function on an on-chain contract.
    InvokeContract {
        source: Option<Address>,
        contract: String,
        function: String,
        args: Vec<String>,
    },
    /// Any operation the engine does not interpret.
    Other { kind: String },
}

impl Operation {
    /// Explicit source account of the operation, if it overrides the
    /// transaction's.
    pub fn source(&self) -> Option<&Address> {
        match self {
            Operation::ManageData { source, .. } | Operation::InvokeContract { source, .. } => {
                source.as_ref()
            }
            Operation::Other { .. } => None,
        }
    }
}

/// Which transaction stream to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionFilter {
    /// Transactions touching one account.
    Account(Address),
    /// All transactions on the network.
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

impl Order {
    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Ascending => "asc",
            Order::Descending => "desc",
        }
    }
}

/// Parameters for a transaction stream query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionQuery {
    pub filter: TransactionFilter,
    pub order: Order,
    pub limit: usize,
    /// Ledger paging token to resume after.
    pub cursor: Option<String>,
}

impl TransactionQuery {
    /// Newest-first query over one account.
    pub fn account(address: Address, limit: usize) -> Self {
        Self {
            filter: TransactionFilter::Account(address),
            order: Order::Descending,
            limit,
            cursor: None,
        }
    }

    /// Newest-first query over the whole network.
    pub fn network(limit: usize) -> Self {
        Self {
            filter: TransactionFilter::Network,
            order: Order::Descending,
            limit,
            cursor: None,
        }
    }

    pub fn after(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }
}

/// A transaction in a stream, without its operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSummary {
    pub id: TransactionId,
    pub source: Address,
    pub created_at: DateTime<Utc>,
    pub ledger: u32,
    pub paging_token: String,
    pub successful: bool,
}

/// Acknowledgement of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub transaction_id: TransactionId,
    pub ledger: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_with_prefix() {
        let mut snapshot = AccountSnapshot::new(Address::new("GA"), 1);
        snapshot.data.insert("config".into(), Bytes::from_static(b"x"));
        snapshot.data.insert("doc:a".into(), Bytes::from_static(b"1"));
        snapshot.data.insert("doc:b".into(), Bytes::from_static(b"2"));
        snapshot.data.insert("zzz".into(), Bytes::from_static(b"3"));

        let keys: Vec<&String> = snapshot.entries_with_prefix("doc:").map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["doc:a", "doc:b"]);
    }

    #[test]
    fn test_operation_source() {
        let op = Operation::ManageData {
            source: Some(Address::new("GB")),
            name: "doc:x".into(),
            value: None,
        };
        assert_eq!(op.source(), Some(&Address::new("GB")));
        assert_eq!(Operation::Other { kind: "payment".into() }.source(), None);
    }
}
