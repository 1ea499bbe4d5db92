//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every component from a validated [`RelayConfig`]
//! - Wire the coordinator, dispatcher and HTTP state together
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Components are constructed explicitly, in dependency order; nothing
//!   initializes itself lazily on first use

use std::str::FromStr;
use std::sync::Arc;

use bitcoin::Network;
use thiserror::Error;

use crate::blockchain::{BitcoinNode, KeyDeriver, TransactionSigner};
use crate::config::RelayConfig;
use crate::coordination::{
    AddressLockTable, Collaborators, Coordinator, CoordinatorSettings, Dispatcher, OperationError,
    StaticWalletPool,
};
use crate::http::AppState;
use crate::ledger::{CounterpartyClient, TransactionComposer};
use crate::persistence::{open_store, StoreError};
use crate::resilience::RetryPolicy;

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid bitcoin network '{0}'")]
    Network(String),

    #[error("Failed to open operation store: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to load custodial wallets: {0}")]
    Wallets(#[source] OperationError),
}

/// Fully constructed components.
pub struct Services {
    pub dispatcher: Arc<Dispatcher>,
}

impl Services {
    pub fn app_state(&self) -> AppState {
        AppState {
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

/// Build all services from `config`.
pub fn build_services(config: &RelayConfig) -> Result<Services, StartupError> {
    let network =
        Network::from_str(&config.bitcoin.network).map_err(|_| StartupError::Network(config.bitcoin.network.clone()))?;

    let retry = RetryPolicy::from(&config.retries);

    let store = open_store(&config.persistence)?;
    let ledger = Arc::new(CounterpartyClient::new(&config.ledger, retry));
    let node = Arc::new(BitcoinNode::new(&config.bitcoin, retry));
    let wallets = StaticWalletPool::from_config(&config.activation).map_err(StartupError::Wallets)?;

    let deriver = Arc::new(KeyDeriver::new(network));
    let signer = Arc::new(TransactionSigner::new(Arc::clone(&deriver), config.coordinator.self_check));

    let coordinator = Coordinator::new(
        Collaborators {
            deriver,
            signer,
            composer: Arc::clone(&ledger) as Arc<dyn TransactionComposer>,
            broadcaster: node,
            store,
            locks: Arc::new(AddressLockTable::new()),
            wallets: Arc::new(wallets),
        },
        CoordinatorSettings::from_config(config.environment, &config.coordinator),
    );
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(coordinator), config.coordinator.max_in_flight));

    tracing::info!(
        network = %network,
        ledger = %ledger.endpoint(),
        max_in_flight = config.coordinator.max_in_flight,
        "Services initialized"
    );

    Ok(Services { dispatcher })
}
