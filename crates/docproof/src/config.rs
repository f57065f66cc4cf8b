//! Engine configuration.
//!
//! Configuration is provided by the environment (or by an embedding
//! application) and validated once, when the engine is built.

use std::time::Duration;

use docproof_core::{Network, ValidationError};
use serde::Deserialize;
use url::Url;

/// Environment variable names read by [`EngineConfig::from_env`].
pub mod env {
    pub const NETWORK: &str = "DOCPROOF_NETWORK";
    pub const ENDPOINT_URL: &str = "DOCPROOF_ENDPOINT_URL";
    pub const NETWORK_PASSPHRASE: &str = "DOCPROOF_NETWORK_PASSPHRASE";
    pub const BASE_FEE: &str = "DOCPROOF_BASE_FEE";
    pub const CONTRACT_ADDRESS: &str = "DOCPROOF_CONTRACT_ADDRESS";
}

pub const DEFAULT_BASE_FEE: u32 = 100;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Where registrations are stored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Data entries on the registrant's own account.
    DataEntry { base_fee: u32 },
    /// A document registry contract.
    Contract {
        contract_address: String,
        base_fee: u32,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::DataEntry {
            base_fee: DEFAULT_BASE_FEE,
        }
    }
}

/// Configuration for a [`DocumentEngine`](crate::DocumentEngine).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub network: Network,
    pub endpoint_url: String,
    pub network_passphrase: String,
    pub backend: BackendConfig,

    /// Account snapshot time-to-live, in seconds.
    pub cache_ttl_secs: u64,
    pub max_file_size: u64,
    pub chunk_size: usize,
    /// Number of recent network transactions the broad lookup inspects.
    pub broad_search_window: usize,
    /// Page size used when a scoped lookup cross-references history.
    pub history_scan_limit: usize,
    pub max_retries: u32,
    /// Base of the exponential retry backoff, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Validity window of submitted transactions, in seconds.
    pub tx_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::for_network(Network::Testnet)
    }
}

impl EngineConfig {
    /// Defaults for a network: its public endpoint and passphrase.
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            endpoint_url: network.default_endpoint().to_string(),
            network_passphrase: network.default_passphrase().to_string(),
            backend: BackendConfig::default(),
            cache_ttl_secs: 30,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            broad_search_window: 200,
            history_scan_limit: 200,
            max_retries: 2,
            retry_base_delay_ms: 1000,
            tx_timeout_secs: 60,
        }
    }

    /// Read configuration from `DOCPROOF_*` environment variables.
    ///
    /// Unset variables keep the network defaults. Setting
    /// `DOCPROOF_CONTRACT_ADDRESS` selects the contract backend.
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network = match lookup(env::NETWORK) {
            Some(value) => value.parse::<Network>()?,
            None => Network::Testnet,
        };
        let mut config = Self::for_network(network);

        if let Some(url) = lookup(env::ENDPOINT_URL) {
            config.endpoint_url = url;
        }
        if let Some(passphrase) = lookup(env::NETWORK_PASSPHRASE) {
            config.network_passphrase = passphrase;
        }
        let base_fee = match lookup(env::BASE_FEE) {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                ValidationError::InvalidConfig(format!("{} must be an integer, got {raw:?}", env::BASE_FEE))
            })?,
            None => DEFAULT_BASE_FEE,
        };
        config.backend = match lookup(env::CONTRACT_ADDRESS) {
            Some(contract_address) if !contract_address.trim().is_empty() => {
                BackendConfig::Contract {
                    contract_address: contract_address.trim().to_string(),
                    base_fee,
                }
            }
            _ => BackendConfig::DataEntry { base_fee },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ValidationError> {
        Url::parse(&self.endpoint_url).map_err(|e| {
            ValidationError::InvalidConfig(format!("endpoint_url {:?}: {e}", self.endpoint_url))
        })?;
        if self.network_passphrase.is_empty() {
            return Err(ValidationError::InvalidConfig(
                "network_passphrase must not be empty".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(ValidationError::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.max_file_size == 0 || self.chunk_size as u64 > self.max_file_size {
            return Err(ValidationError::InvalidConfig(
                "max_file_size must be positive and at least chunk_size".into(),
            ));
        }
        if self.broad_search_window == 0 {
            return Err(ValidationError::InvalidConfig(
                "broad_search_window must be positive".into(),
            ));
        }
        if self.history_scan_limit == 0
            || self.history_scan_limit > docproof_ledger::MAX_PAGE_LIMIT
        {
            return Err(ValidationError::InvalidConfig(format!(
                "history_scan_limit must be between 1 and {}",
                docproof_ledger::MAX_PAGE_LIMIT
            )));
        }
        if let BackendConfig::Contract {
            contract_address, ..
        } = &self.backend
        {
            if contract_address.is_empty() {
                return Err(ValidationError::InvalidConfig(
                    "contract_address must not be empty".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}
