//! Account State Cache: short-lived account snapshots.
//!
//! Every engine path reads account state through here. Registration
//! invalidates an address after each submission attempt, accepted or not,
//! so the next read sees the authoritative sequence number.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use docproof_core::Address;
use docproof_ledger::{AccountSnapshot, Ledger};

use crate::error::{NotaryError, Result};

struct CachedAccount {
    snapshot: AccountSnapshot,
    fetched_at: Instant,
}

/// TTL cache of [`AccountSnapshot`]s keyed by address.
pub struct AccountCache<L: Ledger> {
    ledger: Arc<L>,
    ttl: Duration,
    entries: Mutex<HashMap<Address, CachedAccount>>,
}

impl<L: Ledger> AccountCache<L> {
    pub fn new(ledger: Arc<L>, ttl: Duration) -> Self {
        Self {
            ledger,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Current snapshot of `address`, fetched when missing or stale.
    ///
    /// An entry whose age has reached the TTL is stale. A stale entry that
    /// fails to refresh is dropped, and every insert prunes stale entries.
    pub async fn get(&self, address: &Address) -> Result<AccountSnapshot> {
        {
            let entries = self.entries.lock().await;
            if let Some(cached) = entries.get(address) {
                if cached.fetched_at.elapsed() < self.ttl {
                    debug!(address = %address, "account cache hit");
                    return Ok(cached.snapshot.clone());
                }
            }
        }

        debug!(address = %address, "account cache miss");
        let snapshot = match self.ledger.load_account(address).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.entries.lock().await.remove(address);
                return Err(NotaryError::account_load(address, e));
            }
        };

        let mut entries = self.entries.lock().await;
        let ttl = self.ttl;
        entries.retain(|_, cached| cached.fetched_at.elapsed() < ttl);
        entries.insert(
            address.clone(),
            CachedAccount {
                snapshot: snapshot.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(snapshot)
    }

    /// Drop the cached snapshot of `address`, if any.
    pub async fn invalidate(&self, address: &Address) {
        if self.entries.lock().await.remove(address).is_some() {
            debug!(address = %address, "account cache invalidated");
        }
    }
}
