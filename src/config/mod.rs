//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → consumed once by lifecycle::startup to build every component
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no lazy first-call initialization
//! - All fields have defaults to allow minimal configs
//! - Secrets come from environment variables, never from the file
//! - Any failure here is fatal at process startup

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ActivationConfig, CoordinatorConfig, CustodialWalletConfig, Environment, LedgerConfig,
    ListenerConfig, NodeConfig, ObservabilityConfig, PersistenceConfig, RelayConfig, RetryConfig,
    SelfCheckMode, StorageBackend, WalletSelection,
};
