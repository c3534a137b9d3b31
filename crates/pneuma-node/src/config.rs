//! # Node Configuration
//!
//! JSON configuration file for the node. Collaborator backends are
//! selected per deployment: HTTP daemon or local filesystem for the
//! content store, EVM JSON-RPC or in-memory mock for the ledger.
//!
//! ```json
//! {
//!   "node": {"id": "pc2-node-01", "network": "sepolia"},
//!   "store": {"backend": "http", "base_url": "http://127.0.0.1:5001"},
//!   "ledger": {
//!     "backend": "evm",
//!     "rpc_url": "https://rpc.sepolia.example.com",
//!     "contract_address": "0x...",
//!     "from_address": "0x..."
//!   },
//!   "storage": {"base_dir": "/var/lib/pneuma"},
//!   "watcher": {"watch_interval_secs": 30, "max_attempts": 5}
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use pneuma_ledger::{EvmLedger, EvmLedgerConfig, Ledger, LedgerError, MockLedger};
use pneuma_store::{ContentStore, FsContentStore, HttpContentStore, HttpStoreConfig, StoreError};

/// Errors loading or applying configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        /// Path to the offending file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON or has the wrong shape.
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        /// Path to the offending file.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// A backend could not be constructed from its settings.
    #[error("store backend: {0}")]
    Store(#[from] StoreError),

    /// A backend could not be constructed from its settings.
    #[error("ledger backend: {0}")]
    Ledger(#[from] LedgerError),
}

/// Top-level node configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Node identity, reported in status output.
    pub node: NodeIdentity,
    /// Content-store backend selection.
    pub store: StoreBackend,
    /// Ledger backend selection.
    pub ledger: LedgerBackend,
    /// Filesystem layout for pending/processed/dead-letter files.
    pub storage: StorageSettings,
    /// Watcher intervals and retry policy.
    #[serde(default)]
    pub watcher: WatcherSettings,
}

/// Node identity for status reporting.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeIdentity {
    /// Operator-assigned node id.
    pub id: String,
    /// Network name (e.g., "sepolia", "mainnet", "mock").
    pub network: String,
}

/// Content-store backend selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreBackend {
    /// Content-store daemon over HTTP.
    Http {
        /// Daemon base URL.
        base_url: String,
        /// Per-request timeout in seconds.
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// Local filesystem CAS.
    Fs {
        /// Root directory of the CAS.
        root: PathBuf,
    },
}

/// Ledger backend selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum LedgerBackend {
    /// EVM anchoring contract via JSON-RPC.
    Evm {
        /// JSON-RPC endpoint URL.
        rpc_url: String,
        /// Anchoring contract address.
        contract_address: String,
        /// Sender address (signing delegated to the RPC endpoint).
        from_address: String,
        /// Confirmations required before submit returns.
        #[serde(default = "default_confirmations")]
        confirmations: u64,
        /// Maximum seconds to wait for confirmation.
        #[serde(default = "default_submit_timeout_secs")]
        submit_timeout_secs: u64,
        /// Milliseconds between receipt polls.
        #[serde(default = "default_poll_interval_ms")]
        poll_interval_ms: u64,
    },
    /// In-memory mock ledger (development only).
    Mock,
}

/// Filesystem layout. All node-managed directories live under `base_dir`.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Base directory for pending/processed/deadletter/logs.
    pub base_dir: PathBuf,
}

impl StorageSettings {
    /// Directory watched for incoming `*.json` files.
    pub fn pending_dir(&self) -> PathBuf {
        self.base_dir.join("pending")
    }

    /// Directory successful files are renamed into.
    pub fn processed_dir(&self) -> PathBuf {
        self.base_dir.join("processed")
    }

    /// Directory exhausted files are renamed into.
    pub fn deadletter_dir(&self) -> PathBuf {
        self.base_dir.join("deadletter")
    }

    /// Reserved for operator tooling (log shipping etc.).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }
}

/// Watcher intervals and retry policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatcherSettings {
    /// Seconds between directory scans.
    pub watch_interval_secs: u64,
    /// Seconds between ledger status polls.
    pub status_interval_secs: u64,
    /// Attempts before a file is moved to the dead-letter directory.
    pub max_attempts: u32,
    /// Base backoff delay after the first failed attempt, in seconds.
    pub backoff_base_secs: u64,
    /// Upper bound on the backoff delay, in seconds.
    pub backoff_cap_secs: u64,
    /// Maximum files processed concurrently per tick.
    pub max_concurrency: usize,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            watch_interval_secs: 30,
            status_interval_secs: 300,
            max_attempts: 5,
            backoff_base_secs: 60,
            backoff_cap_secs: 3_600,
            max_concurrency: 4,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_confirmations() -> u64 {
    1
}

fn default_submit_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

impl NodeConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Construct the configured content-store backend.
    pub fn build_store(&self) -> Result<Arc<dyn ContentStore>, ConfigError> {
        let store: Arc<dyn ContentStore> = match &self.store {
            StoreBackend::Http {
                base_url,
                timeout_secs,
            } => {
                let mut config = HttpStoreConfig::new(base_url.clone());
                config.timeout_secs = *timeout_secs;
                Arc::new(HttpContentStore::new(config)?)
            }
            StoreBackend::Fs { root } => Arc::new(FsContentStore::new(root.clone())),
        };
        Ok(store)
    }

    /// Construct the configured ledger backend.
    pub fn build_ledger(&self) -> Result<Arc<dyn Ledger>, ConfigError> {
        let ledger: Arc<dyn Ledger> = match &self.ledger {
            LedgerBackend::Evm {
                rpc_url,
                contract_address,
                from_address,
                confirmations,
                submit_timeout_secs,
                poll_interval_ms,
            } => {
                let config = EvmLedgerConfig::new(
                    rpc_url.clone(),
                    contract_address.clone(),
                    from_address.clone(),
                    self.node.network.clone(),
                )
                .with_confirmations(*confirmations)
                .with_submit_window(*submit_timeout_secs, *poll_interval_ms);
                Arc::new(EvmLedger::new(config)?)
            }
            LedgerBackend::Mock => Arc::new(MockLedger::new()),
        };
        Ok(ledger)
    }
}
