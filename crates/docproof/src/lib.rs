//! # docproof
//!
//! Document verification engine: prove that a file's exact content was
//! registered on a ledger, by whom and when.
//!
//! ## Components
//!
//! - [`ChunkedHasher`] - SHA-256 fingerprints in fixed windows, with progress
//! - [`AccountCache`] - short-TTL account snapshots
//! - [`Registrar`] - build, sign, submit and retry registrations
//! - [`Resolver`] - scoped and broad fingerprint lookup
//! - [`HistoryPaginator`] - an account's registrations, newest first
//! - [`DocumentBackend`] - data-entry or contract storage, chosen by config
//!
//! [`DocumentEngine`] wires these together.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docproof::{DocumentEngine, EngineConfig, RegisterRequest};
//! use docproof::ledger::KeypairWallet;
//!
//! async fn example() -> docproof::Result<()> {
//!     let engine = DocumentEngine::connect(EngineConfig::from_env()?)?;
//!     let wallet = KeypairWallet::generate();
//!
//!     let fingerprint = engine.hash_file("contract.pdf", None).await?;
//!     let tx_id = engine
//!         .register(&wallet, RegisterRequest::new(fingerprint.as_str(), "ContractV1"))
//!         .await?;
//!
//!     let verdict = engine.verify(fingerprint.as_str(), None).await?;
//!     assert!(verdict.is_verified);
//!     # let _ = tx_id;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod history;
pub mod registrar;
pub mod resolver;
pub mod retry;

// Re-export component crates
pub use docproof_core as core;
pub use docproof_ledger as ledger;

pub use backend::{
    backend_from_config, ContractBackend, DataEntryBackend, DocumentBackend, Indexed, Registration,
};
pub use cache::AccountCache;
pub use config::{BackendConfig, EngineConfig};
pub use engine::DocumentEngine;
pub use error::{NotaryError, Result};
pub use hasher::{ChunkedHasher, ProgressFn};
pub use history::{HistoryPaginator, DEFAULT_HISTORY_LIMIT};
pub use registrar::{RegisterRequest, Registrar, SubmitSettings};
pub use resolver::{Resolver, ResolverLimits};
pub use retry::{RetryDecision, RetryPolicy};

// Re-export commonly used core types
pub use docproof_core::{
    Address, Cursor, DocumentName, DocumentRecord, FileFingerprint, HistoryPage, Network,
    TransactionId, VerificationVerdict,
};
