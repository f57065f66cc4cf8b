//! Storage backends: how a registration is written to the ledger and how
//! it is recognized again.
//!
//! Two variants share the same capabilities:
//!
//! - [`DataEntryBackend`] stores `doc:<name> = <hex fingerprint>` as a data
//!   entry on the registrant's account.
//! - [`ContractBackend`] calls `register_document(caller, hash, name)` on a
//!   registry contract.
//!
//! The orchestrator, resolver and paginator are written once against
//! [`DocumentBackend`].

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use docproof_core::{Address, DocumentName, FileFingerprint};
use docproof_ledger::{AccountSnapshot, Operation, REGISTER_FUNCTION};

use crate::config::BackendConfig;

/// A registration decoded from a single ledger operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub fingerprint: FileFingerprint,
    pub name: DocumentName,
    /// Registrant named by the operation itself. `None` means the
    /// transaction's source account registered it.
    pub registrant: Option<Address>,
}

/// Result of looking something up in an account snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indexed<T> {
    Found(T),
    Missing,
    /// The snapshot does not carry this information; consult history.
    NotIndexed,
}

/// Persist and resolve capabilities of a registration store.
pub trait DocumentBackend: Send + Sync + fmt::Debug {
    /// Short label used in logs.
    fn kind(&self) -> &'static str;

    /// Fee offered per operation.
    fn base_fee(&self) -> u32;

    /// Operations that register `fingerprint` under `name` for `registrant`.
    fn registration_operations(
        &self,
        registrant: &Address,
        fingerprint: &FileFingerprint,
        name: &DocumentName,
    ) -> Vec<Operation>;

    /// Recognize a registration written by this backend.
    fn decode_registration(&self, operation: &Operation) -> Option<Registration>;

    /// Name under which the account holds `fingerprint`.
    fn find_fingerprint(
        &self,
        snapshot: &AccountSnapshot,
        fingerprint: &FileFingerprint,
    ) -> Indexed<DocumentName>;

    /// Fingerprint the account holds under `name`.
    fn find_name(&self, snapshot: &AccountSnapshot, name: &DocumentName)
        -> Indexed<FileFingerprint>;
}

/// Build the backend selected by configuration.
pub fn backend_from_config(config: &BackendConfig) -> Arc<dyn DocumentBackend> {
    match config {
        BackendConfig::DataEntry { base_fee } => Arc::new(DataEntryBackend::new(*base_fee)),
        BackendConfig::Contract {
            contract_address,
            base_fee,
        } => Arc::new(ContractBackend::new(contract_address.clone(), *base_fee)),
    }
}

/// Registrations as namespaced data entries on the registrant's account.
#[derive(Debug, Clone)]
pub struct DataEntryBackend {
    base_fee: u32,
}

impl DataEntryBackend {
    pub fn new(base_fee: u32) -> Self {
        Self { base_fee }
    }
}

impl DocumentBackend for DataEntryBackend {
    fn kind(&self) -> &'static str {
        "data_entry"
    }

    fn base_fee(&self) -> u32 {
        self.base_fee
    }

    fn registration_operations(
        &self,
        _registrant: &Address,
        fingerprint: &FileFingerprint,
        name: &DocumentName,
    ) -> Vec<Operation> {
        vec![Operation::ManageData {
            source: None,
            name: name.data_key(),
            value: Some(Bytes::copy_from_slice(fingerprint.as_ledger_value())),
        }]
    }

    fn decode_registration(&self, operation: &Operation) -> Option<Registration> {
        let Operation::ManageData {
            source,
            name,
            value: Some(value),
        } = operation
        else {
            return None;
        };
        let name = DocumentName::from_data_key(name)?;
        let fingerprint = FileFingerprint::from_hex(std::str::from_utf8(value).ok()?).ok()?;
        Some(Registration {
            fingerprint,
            name,
            registrant: source.clone(),
        })
    }

    fn find_fingerprint(
        &self,
        snapshot: &AccountSnapshot,
        fingerprint: &FileFingerprint,
    ) -> Indexed<DocumentName> {
        snapshot
            .entries_with_prefix(docproof_core::DATA_KEY_PREFIX)
            .filter(|(_, value)| fingerprint.matches_ledger_value(value))
            .find_map(|(key, _)| DocumentName::from_data_key(key))
            .map_or(Indexed::Missing, Indexed::Found)
    }

    fn find_name(
        &self,
        snapshot: &AccountSnapshot,
        name: &DocumentName,
    ) -> Indexed<FileFingerprint> {
        match snapshot.data.get(&name.data_key()) {
            // An entry that does not decode still occupies the key.
            Some(value) => std::str::from_utf8(value)
                .ok()
                .and_then(|hex| FileFingerprint::from_hex(hex).ok())
                .map_or(Indexed::NotIndexed, Indexed::Found),
            None => Indexed::Missing,
        }
    }
}

/// Registrations held in a registry contract's storage.
///
/// Account snapshots do not expose contract storage, so lookups go
/// through the registrant's transaction history.
#[derive(Debug, Clone)]
pub struct ContractBackend {
    contract: String,
    base_fee: u32,
}

impl ContractBackend {
    pub fn new(contract: impl Into<String>, base_fee: u32) -> Self {
        Self {
            contract: contract.into(),
            base_fee,
        }
    }
}

impl DocumentBackend for ContractBackend {
    fn kind(&self) -> &'static str {
        "contract"
    }

    fn base_fee(&self) -> u32 {
        self.base_fee
    }

    fn registration_operations(
        &self,
        registrant: &Address,
        fingerprint: &FileFingerprint,
        name: &DocumentName,
    ) -> Vec<Operation> {
        vec![Operation::InvokeContract {
            source: None,
            contract: self.contract.clone(),
            function: REGISTER_FUNCTION.to_string(),
            args: vec![
                registrant.to_string(),
                fingerprint.as_str().to_string(),
                name.as_str().to_string(),
            ],
        }]
    }

    fn decode_registration(&self, operation: &Operation) -> Option<Registration> {
        let Operation::InvokeContract {
            contract,
            function,
            args,
            ..
        } = operation
        else {
            return None;
        };
        if contract != &self.contract || function != REGISTER_FUNCTION {
            return None;
        }
        let [caller, hash, name] = args.as_slice() else {
            return None;
        };
        let fingerprint = FileFingerprint::from_hex(hash).ok()?;
        // The contract accepts names this client cannot represent.
        let name = match DocumentName::new(name) {
            Ok(name) => name,
            Err(e) => {
                debug!(
                    contract = %self.contract,
                    fingerprint = %fingerprint,
                    error = %e,
                    "skipping contract registration with unsupported name"
                );
                return None;
            }
        };
        Some(Registration {
            fingerprint,
            name,
            registrant: Some(Address::new(caller.clone())),
        })
    }

    fn find_fingerprint(&self, _: &AccountSnapshot, _: &FileFingerprint) -> Indexed<DocumentName> {
        Indexed::NotIndexed
    }

    fn find_name(&self, _: &AccountSnapshot, _: &DocumentName) -> Indexed<FileFingerprint> {
        Indexed::NotIndexed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint() -> FileFingerprint {
        FileFingerprint::of_bytes(b"contract body")
    }

    fn name(s: &str) -> DocumentName {
        DocumentName::new(s).unwrap()
    }

    #[test]
    fn test_data_entry_operation_roundtrip() {
        let backend = DataEntryBackend::new(100);
        let registrant = Address::new("GREG");
        let ops = backend.registration_operations(&registrant, &fingerprint(), &name("ContractV1"));
        assert_eq!(ops.len(), 1);

        let Operation::ManageData { name: key, value, .. } = &ops[0] else {
            panic!("expected a data entry");
        };
        assert_eq!(key, "doc:ContractV1");
        assert_eq!(value.as_deref(), Some(fingerprint().as_ledger_value()));

        let decoded = backend.decode_registration(&ops[0]).unwrap();
        assert_eq!(decoded.fingerprint, fingerprint());
        assert_eq!(decoded.name, name("ContractV1"));
        assert_eq!(decoded.registrant, None);
    }

    #[test]
    fn test_data_entry_ignores_foreign_operations() {
        let backend = DataEntryBackend::new(100);
        let foreign = [
            Operation::ManageData {
                source: None,
                name: "config:theme".into(),
                value: Some(Bytes::from_static(b"dark")),
            },
            Operation::ManageData {
                source: None,
                name: "doc:removed".into(),
                value: None,
            },
            Operation::ManageData {
                source: None,
                name: "doc:garbage".into(),
                value: Some(Bytes::from_static(b"not a fingerprint")),
            },
            Operation::Other {
                kind: "payment".into(),
            },
        ];
        for op in &foreign {
            assert_eq!(backend.decode_registration(op), None);
        }
    }

    #[test]
    fn test_data_entry_snapshot_scan() {
        let backend = DataEntryBackend::new(100);
        let mut snapshot = AccountSnapshot::new(Address::new("GREG"), 7);
        snapshot.data.insert(
            "doc:ContractV1".into(),
            Bytes::copy_from_slice(fingerprint().as_ledger_value()),
        );
        snapshot
            .data
            .insert("doc:broken".into(), Bytes::from_static(b"xyz"));

        assert_eq!(
            backend.find_fingerprint(&snapshot, &fingerprint()),
            Indexed::Found(name("ContractV1"))
        );
        assert_eq!(
            backend.find_fingerprint(&snapshot, &FileFingerprint::of_bytes(b"other")),
            Indexed::Missing
        );
        assert_eq!(
            backend.find_name(&snapshot, &name("ContractV1")),
            Indexed::Found(fingerprint())
        );
        assert_eq!(backend.find_name(&snapshot, &name("absent")), Indexed::Missing);
        assert_eq!(backend.find_name(&snapshot, &name("broken")), Indexed::NotIndexed);
    }

    #[test]
    fn test_contract_operation_roundtrip() {
        let backend = ContractBackend::new("CREGISTRY", 100);
        let registrant = Address::new("GREG");
        let ops = backend.registration_operations(&registrant, &fingerprint(), &name("deed"));

        let decoded = backend.decode_registration(&ops[0]).unwrap();
        assert_eq!(decoded.registrant, Some(registrant));
        assert_eq!(decoded.name, name("deed"));

        let other_contract = ContractBackend::new("COTHER", 100);
        assert_eq!(other_contract.decode_registration(&ops[0]), None);

        let snapshot = AccountSnapshot::new(Address::new("GREG"), 1);
        assert_eq!(
            backend.find_fingerprint(&snapshot, &fingerprint()),
            Indexed::NotIndexed
        );
    }

    #[test]
    fn test_contract_skips_unsupported_names() {
        let backend = ContractBackend::new("CREGISTRY", 100);
        let invoke = |doc_name: &str| Operation::InvokeContract {
            source: None,
            contract: "CREGISTRY".into(),
            function: REGISTER_FUNCTION.into(),
            args: vec![
                "GREG".into(),
                fingerprint().as_str().to_string(),
                doc_name.into(),
            ],
        };

        assert_eq!(backend.decode_registration(&invoke("board minutes (final)")), None);
        assert_eq!(
            backend
                .decode_registration(&invoke("board-minutes"))
                .map(|r| r.name),
            Some(name("board-minutes"))
        );
    }

    #[test]
    fn test_backend_from_config() {
        let backend = backend_from_config(&BackendConfig::Contract {
            contract_address: "CREGISTRY".into(),
            base_fee: 300,
        });
        assert_eq!(backend.kind(), "contract");
        assert_eq!(backend.base_fee(), 300);
        assert_eq!(backend_from_config(&BackendConfig::default()).kind(), "data_entry");
    }
}
