//! # docproof testkit
//!
//! Testing utilities for the document verification engine.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a funded wallet on an in-memory ledger, and engines tuned for tests
//! - **Doubles**: a ledger that fails on demand, wallets that refuse or are missing
//! - **Generators**: Proptest strategies for names, content and fingerprints
//! - **Golden vectors**: published SHA-256 results every hasher configuration must match
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use docproof_testkit::fixtures::{register_content, TestFixture};
//!
//! async fn example() {
//!     let fixture = TestFixture::new().await;
//!     let engine = fixture.engine();
//!     let (fingerprint, _tx) = register_content(&engine, &fixture.wallet, b"hello", "greeting")
//!         .await
//!         .unwrap();
//!     let verdict = engine
//!         .verify(fingerprint.as_str(), Some(&fixture.address()))
//!         .await
//!         .unwrap();
//!     assert!(verdict.is_verified);
//! }
//! ```

pub mod doubles;
pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use doubles::{FlakyLedger, RejectingWallet, UnavailableWallet};
pub use fixtures::{contract_config, init_tracing, register_content, test_config, TestFixture};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
