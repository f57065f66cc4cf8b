//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a shared in-memory ledger, a
//! funded wallet, and engines configured for fast tests.

use std::sync::Arc;

use docproof::{BackendConfig, DocumentEngine, EngineConfig, RegisterRequest, Result};
use docproof_core::{Address, FileFingerprint, Keypair, TransactionId};
use docproof_ledger::{KeypairWallet, Ledger, MemoryLedger};

use crate::doubles::FlakyLedger;

/// Contract id used by contract-backend fixtures.
pub const TEST_CONTRACT: &str = "CDOCREGISTRY";

/// Engine configuration for tests: millisecond backoff, default limits.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        retry_base_delay_ms: 1,
        ..EngineConfig::default()
    }
}

/// Same as [`test_config`], storing registrations in [`TEST_CONTRACT`].
pub fn contract_config() -> EngineConfig {
    EngineConfig {
        backend: BackendConfig::Contract {
            contract_address: TEST_CONTRACT.to_string(),
            base_fee: 100,
        },
        ..test_config()
    }
}

/// Install a test-friendly tracing subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// A funded wallet on a fresh in-memory ledger.
pub struct TestFixture {
    pub ledger: Arc<MemoryLedger>,
    pub wallet: KeypairWallet,
}

impl TestFixture {
    /// Create a fixture with a random, funded keypair.
    pub async fn new() -> Self {
        Self::with_keypair(Keypair::generate()).await
    }

    async fn with_keypair(keypair: Keypair) -> Self {
        let ledger = Arc::new(MemoryLedger::default());
        let wallet = KeypairWallet::new(keypair);
        ledger.fund(&wallet.keypair().address()).await;
        Self { ledger, wallet }
    }

    /// The wallet's account address.
    pub fn address(&self) -> Address {
        self.wallet.keypair().address()
    }

    /// A second funded wallet on the same ledger.
    pub async fn other_wallet(&self) -> KeypairWallet {
        let wallet = KeypairWallet::generate();
        self.ledger.fund(&wallet.keypair().address()).await;
        wallet
    }

    /// Data-entry engine over the fixture's ledger.
    pub fn engine(&self) -> DocumentEngine<MemoryLedger> {
        self.engine_with(test_config())
    }

    /// Contract-backed engine over the fixture's ledger.
    pub fn contract_engine(&self) -> DocumentEngine<MemoryLedger> {
        self.engine_with(contract_config())
    }

    pub fn engine_with(&self, config: EngineConfig) -> DocumentEngine<MemoryLedger> {
        match DocumentEngine::with_shared_ledger(self.ledger.clone(), config) {
            Ok(engine) => engine,
            Err(e) => panic!("test configuration rejected: {e}"),
        }
    }

    /// Engine over a [`FlakyLedger`] wrapping the fixture's ledger.
    pub fn flaky_engine(
        &self,
        config: EngineConfig,
    ) -> (Arc<FlakyLedger<Arc<MemoryLedger>>>, DocumentEngine<FlakyLedger<Arc<MemoryLedger>>>) {
        let flaky = Arc::new(FlakyLedger::new(self.ledger.clone()));
        match DocumentEngine::with_shared_ledger(flaky.clone(), config) {
            Ok(engine) => (flaky, engine),
            Err(e) => panic!("test configuration rejected: {e}"),
        }
    }
}

/// Hash `content` and register it under `name` with the fixture wallet.
pub async fn register_content<L: Ledger>(
    engine: &DocumentEngine<L>,
    wallet: &KeypairWallet,
    content: &[u8],
    name: &str,
) -> Result<(FileFingerprint, TransactionId)> {
    let fingerprint = engine.hash_bytes(content, None).await?;
    let tx_id = engine
        .register(wallet, RegisterRequest::new(fingerprint.as_str(), name))
        .await?;
    Ok((fingerprint, tx_id))
}
