//! # docproof ledger
//!
//! The engine's external collaborators, expressed as traits, plus the
//! implementations that ship with the workspace.
//!
//! ## Key Types
//!
//! - [`Ledger`] - account loading, submission and transaction streams
//! - [`Wallet`] - address discovery and envelope signing
//! - [`MemoryLedger`] - in-memory ledger with network submission rules, for tests
//! - [`HttpLedger`] - REST client for a Horizon-style API
//! - [`KeypairWallet`] - wallet backed by a local Ed25519 keypair
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docproof_ledger::{HttpLedger, Ledger};
//! use docproof_core::Address;
//!
//! async fn example() {
//!     let ledger = HttpLedger::new("https://horizon-testnet.stellar.org/").unwrap();
//!     let account = ledger.load_account(&Address::new("GABC...")).await;
//!     // account.sequence, account.data ...
//! }
//! ```

pub mod envelope;
pub mod error;
pub mod http;
pub mod memory;
pub mod model;
pub mod traits;
pub mod wallet;

pub use envelope::{DecoratedSignature, SignedEnvelope, TimeBounds, TransactionEnvelope};
pub use error::{codes, LedgerError, Result, WalletError};
pub use http::HttpLedger;
pub use memory::{MemoryLedger, BASE_FEE, REGISTER_FUNCTION};
pub use model::{
    AccountSnapshot, Operation, Order, SubmitReceipt, TransactionFilter, TransactionQuery,
    TransactionSummary, MAX_PAGE_LIMIT,
};
pub use traits::{Ledger, Wallet};
pub use wallet::KeypairWallet;
