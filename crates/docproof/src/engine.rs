//! The engine façade: hashing, registration, verification and history
//! behind one type.

use std::path::Path;
use std::sync::Arc;

use tokio::io::AsyncRead;
use tracing::info;

use docproof_core::{
    Address, Cursor, DocumentName, DocumentRecord, FileFingerprint, HistoryPage, TransactionId,
    VerificationVerdict,
};
use docproof_ledger::{HttpLedger, Ledger, Wallet};

use crate::backend::{backend_from_config, DocumentBackend};
use crate::cache::AccountCache;
use crate::config::EngineConfig;
use crate::error::{NotaryError, Result};
use crate::hasher::{ChunkedHasher, ProgressFn};
use crate::history::{HistoryPaginator, DEFAULT_HISTORY_LIMIT};
use crate::registrar::{RegisterRequest, Registrar, SubmitSettings};
use crate::resolver::{Resolver, ResolverLimits};
use crate::retry::RetryPolicy;

/// Document verification engine over a ledger `L`.
///
/// The engine holds no state of its own apart from the account cache;
/// every answer is derived from the ledger. The wallet is passed to each
/// call that signs, so one engine can serve several wallets.
pub struct DocumentEngine<L: Ledger> {
    config: EngineConfig,
    ledger: Arc<L>,
    backend: Arc<dyn DocumentBackend>,
    hasher: ChunkedHasher,
    cache: Arc<AccountCache<L>>,
    history: Arc<HistoryPaginator<L>>,
    resolver: Arc<Resolver<L>>,
    registrar: Registrar<L>,
}

impl DocumentEngine<HttpLedger> {
    /// Engine talking to the REST endpoint named in `config`.
    pub fn connect(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let ledger = HttpLedger::new(&config.endpoint_url)
            .map_err(|e| NotaryError::network("could not create ledger client", e))?;
        Self::new(ledger, config)
    }
}

impl<L: Ledger> DocumentEngine<L> {
    /// Create an engine. The configuration is validated first.
    pub fn new(ledger: L, config: EngineConfig) -> Result<Self> {
        Self::with_shared_ledger(Arc::new(ledger), config)
    }

    /// Create an engine over a ledger the caller also holds.
    pub fn with_shared_ledger(ledger: Arc<L>, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let backend = backend_from_config(&config.backend);
        let hasher = ChunkedHasher::new(config.chunk_size, config.max_file_size);
        let cache = Arc::new(AccountCache::new(ledger.clone(), config.cache_ttl()));
        let history = Arc::new(HistoryPaginator::new(ledger.clone(), backend.clone()));
        let resolver = Arc::new(Resolver::new(
            ledger.clone(),
            cache.clone(),
            history.clone(),
            backend.clone(),
            ResolverLimits {
                broad_search_window: config.broad_search_window,
                history_scan_limit: config.history_scan_limit,
            },
        ));
        let registrar = Registrar::new(
            ledger.clone(),
            cache.clone(),
            resolver.clone(),
            backend.clone(),
            SubmitSettings {
                network_passphrase: config.network_passphrase.clone(),
                tx_timeout: std::time::Duration::from_secs(config.tx_timeout_secs),
                retry: RetryPolicy::new(config.max_retries, config.retry_base_delay()),
            },
        );

        info!(
            network = %config.network,
            endpoint = %config.endpoint_url,
            backend = backend.kind(),
            "document engine ready"
        );

        Ok(Self {
            config,
            ledger,
            backend,
            hasher,
            cache,
            history,
            resolver,
            registrar,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn backend(&self) -> &dyn DocumentBackend {
        self.backend.as_ref()
    }

    pub fn hasher(&self) -> &ChunkedHasher {
        &self.hasher
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Hashing
    // ─────────────────────────────────────────────────────────────────────────

    /// Fingerprint a file on disk.
    pub async fn hash_file(
        &self,
        path: impl AsRef<Path>,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<FileFingerprint> {
        Ok(self.hasher.hash_file(path, progress).await?)
    }

    /// Fingerprint `len` bytes from an async reader.
    pub async fn hash_reader<R>(
        &self,
        reader: R,
        len: u64,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<FileFingerprint>
    where
        R: AsyncRead + Unpin + Send,
    {
        Ok(self.hasher.hash_reader(reader, len, progress).await?)
    }

    /// Fingerprint an in-memory buffer.
    pub async fn hash_bytes(
        &self,
        data: &[u8],
        progress: Option<ProgressFn<'_>>,
    ) -> Result<FileFingerprint> {
        Ok(self.hasher.hash_bytes(data, progress).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a fingerprint under a name, signing with `wallet`.
    pub async fn register(
        &self,
        wallet: &dyn Wallet,
        request: RegisterRequest,
    ) -> Result<TransactionId> {
        self.registrar.register(wallet, request).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────────

    /// Verify a hex fingerprint.
    ///
    /// With an address, only that account's registrations are consulted.
    /// Without one, the most recent `broad_search_window` network
    /// transactions are scanned; older registrations are not found.
    pub async fn verify(
        &self,
        fingerprint: &str,
        address: Option<&Address>,
    ) -> Result<VerificationVerdict> {
        let fingerprint = FileFingerprint::from_hex(fingerprint)?;
        self.resolver.verify(&fingerprint, address).await
    }

    /// The document `address` registered under `name`.
    pub async fn get_document_by_name(
        &self,
        address: &Address,
        name: &str,
    ) -> Result<VerificationVerdict> {
        let name = DocumentName::new(name)?;
        self.resolver.find_by_name(address, &name).await
    }

    /// Whether `address` already holds a document under `name`.
    pub async fn is_document_name_used(&self, address: &Address, name: &str) -> Result<bool> {
        let name = DocumentName::new(name)?;
        self.resolver.name_in_use(address, &name).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // History
    // ─────────────────────────────────────────────────────────────────────────

    /// One page of `address`'s registrations, newest first.
    ///
    /// `limit` defaults to [`DEFAULT_HISTORY_LIMIT`] and must lie in
    /// `1..=200`. It counts transactions, not records: a transaction that
    /// registers several documents contributes all of them, so a page can
    /// hold more than `limit` records. `has_more` is set when the page read
    /// a full `limit` of transactions.
    ///
    /// `cursor` must be a token returned by a previous page.
    pub async fn history(
        &self,
        address: &Address,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> Result<HistoryPage> {
        let cursor = cursor.map(Cursor::parse).transpose()?;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        self.history.history(address, limit, cursor.as_ref()).await
    }

    /// Every registration `address` has made, newest first.
    pub async fn documents(&self, address: &Address) -> Result<Vec<DocumentRecord>> {
        self.history.all_records(address).await
    }

    /// Number of registrations `address` has made.
    pub async fn document_count(&self, address: &Address) -> Result<usize> {
        Ok(self.history.all_records(address).await?.len())
    }

    /// Forget the cached state of `address`.
    pub async fn invalidate_account(&self, address: &Address) {
        self.cache.invalidate(address).await;
    }
}
