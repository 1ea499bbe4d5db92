//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the transaction relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Deployment environment; decides whether transactions are broadcast.
    pub environment: Environment,

    /// HTTP listener configuration.
    pub listener: ListenerConfig,

    /// Bitcoin full node used for broadcasting.
    pub bitcoin: NodeConfig,

    /// Counterparty ledger RPC used for composing transactions.
    pub ledger: LedgerConfig,

    /// Saga tuning.
    pub coordinator: CoordinatorConfig,

    /// Custodial wallets used to fund address activations.
    pub activation: ActivationConfig,

    /// Operation record storage.
    pub persistence: PersistenceConfig,

    /// Retry configuration for RPC transport failures.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    /// Development and test deployments never touch the network for broadcasts.
    pub fn skips_broadcast(&self) -> bool {
        matches!(self, Environment::Development | Environment::Test)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds. Only covers the synchronous accept path.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_size: 64 * 1024,
        }
    }
}

/// Bitcoin node RPC configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Network name: "bitcoin", "testnet", "signet" or "regtest".
    pub network: String,

    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Basic auth user.
    pub rpc_user: String,

    /// Basic auth password. Overridden by `RELAY_BITCOIN_RPC_PASSWORD`.
    pub rpc_password: String,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: "testnet".to_string(),
            rpc_url: "http://localhost:18332".to_string(),
            rpc_user: "rpc".to_string(),
            rpc_password: String::new(),
            rpc_timeout_secs: 10,
        }
    }
}

/// Counterparty ledger RPC configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Basic auth user.
    pub rpc_user: String,

    /// Basic auth password. Overridden by `RELAY_LEDGER_RPC_PASSWORD`.
    pub rpc_password: String,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:14000/api/".to_string(),
            rpc_user: "rpc".to_string(),
            rpc_password: String::new(),
            rpc_timeout_secs: 30,
        }
    }
}

/// Which inputs the signer re-verifies after signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelfCheckMode {
    /// Verify every signed input.
    #[default]
    AllInputs,
    /// Verify input 0 only.
    FirstInput,
}

/// Saga tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Ledger poll interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Added to the poll interval to form the mempool propagation delay.
    pub propagation_margin_ms: u64,

    /// Deadline for each of compose, sign and broadcast, in seconds.
    pub step_timeout_secs: u64,

    /// Maximum number of sagas in flight before submissions are refused.
    pub max_in_flight: usize,

    /// Post-signing verification scope.
    pub self_check: SelfCheckMode,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10_000,
            propagation_margin_ms: 3_000,
            step_timeout_secs: 120,
            max_in_flight: 256,
            self_check: SelfCheckMode::AllInputs,
        }
    }
}

/// How the activation source wallet is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WalletSelection {
    #[default]
    RoundRobin,
    Fixed,
}

/// Custodial wallet pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// Selection strategy.
    pub selection: WalletSelection,

    /// Index used when `selection = "fixed"`.
    pub fixed_index: usize,

    /// Funding wallets.
    pub wallets: Vec<CustodialWalletConfig>,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            selection: WalletSelection::RoundRobin,
            fixed_index: 0,
            wallets: Vec::new(),
        }
    }
}

/// A funding wallet. The passphrase itself is never stored in the file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustodialWalletConfig {
    /// Funding address derived from the passphrase.
    pub address: String,

    /// Name of the environment variable holding the mnemonic passphrase.
    pub passphrase_env: String,
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Operation record storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Backend kind.
    pub backend: StorageBackend,

    /// SQLite database file.
    pub sqlite_path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            sqlite_path: "relay.db".to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
