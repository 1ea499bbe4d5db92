//! The delegated-transaction saga.
//!
//! # State Machine
//! ```text
//! Accepted → Locked → Composed → Signed → Broadcast → Complete
//!     └──────────┴─────────┴─────────┴─────────┴──→ Error
//! ```
//!
//! # Design Decisions
//! - The record is inserted before any lock is taken
//! - The propagation delay is slept while holding the address lock, so each
//!   composition sees the previous transaction's change output
//! - Failures are persisted before the lock is released
//! - Compose, sign and broadcast each run under a deadline

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use uuid::Uuid;

use crate::blockchain::{Broadcaster, KeyDeriver, KeyPair, Passphrase, TransactionSigner};
use crate::config::{CoordinatorConfig, Environment};
use crate::coordination::activation::{activation_quantity, WalletPool, ACTIVATION_ASSET};
use crate::coordination::error::OperationError;
use crate::coordination::locks::AddressLockTable;
use crate::coordination::operations::{
    AcceptedOperation, ComposeStep, OperationRequest, MAX_CORRELATION_ID_LEN,
};
use crate::ledger::asset::{generate_numeric_asset_name, truncate_description};
use crate::ledger::{DividendParams, IssuanceParams, LedgerResult, SendParams, TransactionComposer};
use crate::observability::metrics;
use crate::persistence::{NewOperation, OperationStore};

/// Broadcast id recorded when the environment skips the network.
pub const BROADCAST_SENTINEL: &str = "success";

/// Timing and environment knobs.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub environment: Environment,
    pub propagation_delay: Duration,
    pub step_timeout: Duration,
}

impl CoordinatorSettings {
    pub fn from_config(environment: Environment, config: &CoordinatorConfig) -> Self {
        Self {
            environment,
            propagation_delay: Duration::from_millis(config.poll_interval_ms + config.propagation_margin_ms),
            step_timeout: Duration::from_secs(config.step_timeout_secs),
        }
    }
}

/// Everything the saga talks to.
pub struct Collaborators {
    pub deriver: Arc<KeyDeriver>,
    pub signer: Arc<TransactionSigner>,
    pub composer: Arc<dyn TransactionComposer>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub store: Arc<dyn OperationStore>,
    pub locks: Arc<AddressLockTable>,
    pub wallets: Arc<dyn WalletPool>,
}

/// Runs operations from acceptance to a terminal record state.
pub struct Coordinator {
    deriver: Arc<KeyDeriver>,
    signer: Arc<TransactionSigner>,
    composer: Arc<dyn TransactionComposer>,
    broadcaster: Arc<dyn Broadcaster>,
    store: Arc<dyn OperationStore>,
    locks: Arc<AddressLockTable>,
    wallets: Arc<dyn WalletPool>,
    settings: CoordinatorSettings,
}

impl Coordinator {
    pub fn new(parts: Collaborators, settings: CoordinatorSettings) -> Self {
        tracing::info!(
            environment = ?settings.environment,
            propagation_delay_ms = settings.propagation_delay.as_millis() as u64,
            step_timeout_secs = settings.step_timeout.as_secs(),
            custodial_wallets = parts.wallets.len(),
            "Coordinator initialized"
        );
        Self {
            deriver: parts.deriver,
            signer: parts.signer,
            composer: parts.composer,
            broadcaster: parts.broadcaster,
            store: parts.store,
            locks: parts.locks,
            wallets: parts.wallets,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn OperationStore> {
        &self.store
    }

    pub fn locks(&self) -> &Arc<AddressLockTable> {
        &self.locks
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Validate `request`, assign its correlation id and insert the `valid`
    /// record.
    pub async fn accept(&self, request: OperationRequest) -> Result<AcceptedOperation, OperationError> {
        let kind = request.kind();
        let access_key = request.access_key().to_string();
        require("access key", &access_key)?;
        let correlation_id = match request.correlation_id() {
            Some(id) => validate_correlation_id(id)?,
            None => Uuid::new_v4().to_string(),
        };

        let (accepted, record) = match request {
            OperationRequest::Payment(r) => {
                require("source", &r.source)?;
                require("destination", &r.destination)?;
                require("asset", &r.asset)?;
                require_positive("quantity", r.quantity)?;

                let record = NewOperation {
                    kind,
                    correlation_id: correlation_id.clone(),
                    access_key: access_key.clone(),
                    source_address: r.source.clone(),
                    destination: Some(r.destination.clone()),
                    asset: Some(r.asset.clone()),
                    dividend_asset: None,
                    quantity: r.quantity,
                    divisible: None,
                    description: None,
                    tag: r.tag,
                };
                let step = ComposeStep::Send {
                    destination: r.destination,
                    asset: r.asset,
                    quantity: r.quantity,
                };
                ((r.source, r.passphrase, step), record)
            }
            OperationRequest::Asset(r) => {
                require("source", &r.source)?;
                require_positive("quantity", r.quantity)?;
                let asset = match r.asset {
                    Some(name) => {
                        require("asset", &name)?;
                        name
                    }
                    None => generate_numeric_asset_name(),
                };
                let description = truncate_description(&r.description).to_string();

                let record = NewOperation {
                    kind,
                    correlation_id: correlation_id.clone(),
                    access_key: access_key.clone(),
                    source_address: r.source.clone(),
                    destination: None,
                    asset: Some(asset.clone()),
                    dividend_asset: None,
                    quantity: r.quantity,
                    divisible: Some(r.divisible),
                    description: Some(description.clone()),
                    tag: r.tag,
                };
                let step = ComposeStep::Issuance {
                    asset,
                    description,
                    quantity: r.quantity,
                    divisible: r.divisible,
                };
                ((r.source, r.passphrase, step), record)
            }
            OperationRequest::Dividend(r) => {
                require("source", &r.source)?;
                require("asset", &r.asset)?;
                require("dividend asset", &r.dividend_asset)?;
                require_positive("quantity per unit", r.quantity_per_unit)?;

                let record = NewOperation {
                    kind,
                    correlation_id: correlation_id.clone(),
                    access_key: access_key.clone(),
                    source_address: r.source.clone(),
                    destination: None,
                    asset: Some(r.asset.clone()),
                    dividend_asset: Some(r.dividend_asset.clone()),
                    quantity: r.quantity_per_unit,
                    divisible: None,
                    description: None,
                    tag: r.tag,
                };
                let step = ComposeStep::Dividend {
                    asset: r.asset,
                    dividend_asset: r.dividend_asset,
                    quantity_per_unit: r.quantity_per_unit,
                };
                ((r.source, r.passphrase, step), record)
            }
            OperationRequest::Activation(r) => {
                require("destination", &r.destination)?;
                let quantity = activation_quantity(r.activation_count)?;
                let wallet = self.wallets.next_wallet()?;

                let record = NewOperation {
                    kind,
                    correlation_id: correlation_id.clone(),
                    access_key: access_key.clone(),
                    source_address: wallet.address.clone(),
                    destination: Some(r.destination.clone()),
                    asset: Some(ACTIVATION_ASSET.to_string()),
                    dividend_asset: None,
                    quantity,
                    divisible: None,
                    description: None,
                    tag: r.tag,
                };
                let step = ComposeStep::Send {
                    destination: r.destination,
                    asset: ACTIVATION_ASSET.to_string(),
                    quantity,
                };
                ((wallet.address, wallet.passphrase, step), record)
            }
        };

        self.store.insert(record).await?;
        metrics::record_operation(kind.as_str(), "accepted");

        let (source, passphrase, step) = accepted;
        tracing::info!(
            kind = %kind,
            correlation_id = %correlation_id,
            source = %source,
            "Operation accepted"
        );

        Ok(AcceptedOperation {
            kind,
            correlation_id,
            access_key,
            source,
            passphrase,
            step,
        })
    }

    /// Drive an accepted operation to a terminal state and return the
    /// broadcast id.
    pub async fn execute(&self, op: AcceptedOperation) -> Result<String, OperationError> {
        let start = Instant::now();
        let result = self.run_saga(&op).await;

        match &result {
            Ok(txid) => {
                metrics::record_operation(op.kind.as_str(), "complete");
                tracing::info!(
                    kind = %op.kind,
                    correlation_id = %op.correlation_id,
                    txid = %txid,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Operation complete"
                );
            }
            Err(e) => {
                metrics::record_operation(op.kind.as_str(), "error");
                metrics::record_operation_error(op.kind.as_str(), e.category());
                tracing::warn!(
                    kind = %op.kind,
                    correlation_id = %op.correlation_id,
                    category = e.category(),
                    error = %e,
                    "Operation failed"
                );
            }
        }
        result
    }

    /// Persist `error` on the operation's record. A failure to persist is
    /// logged and otherwise ignored.
    pub async fn record_failure(&self, op: &AcceptedOperation, error: &OperationError) {
        let description = error.to_string();
        if let Err(store_err) = self
            .store
            .update_with_error(op.kind, &op.access_key, &op.correlation_id, &description)
            .await
        {
            tracing::error!(
                kind = %op.kind,
                correlation_id = %op.correlation_id,
                error = %store_err,
                original_error = %description,
                "Failed to persist operation error"
            );
        }
    }

    async fn run_saga(&self, op: &AcceptedOperation) -> Result<String, OperationError> {
        let keys = match self.resolve_keys(op).await {
            Ok(keys) => keys,
            Err(e) => {
                self.record_failure(op, &e).await;
                return Err(e);
            }
        };
        let pubkey = keys.public_key_hex();
        let pubkey = pubkey.as_str();

        self.locks
            .with_address_lock(&op.source, move || async move {
                let result = self.locked_steps(op, pubkey).await;
                if let Err(e) = &result {
                    self.record_failure(op, e).await;
                }
                result
            })
            .await
    }

    async fn resolve_keys(&self, op: &AcceptedOperation) -> Result<KeyPair, OperationError> {
        let deriver = Arc::clone(&self.deriver);
        let passphrase = op.passphrase.clone();
        let source = op.source.clone();

        tokio::task::spawn_blocking(move || deriver.resolve_key_for_address(&passphrase, &source))
            .await
            .map_err(|e| OperationError::TaskFailed(e.to_string()))?
            .map_err(OperationError::from)
    }

    async fn locked_steps(&self, op: &AcceptedOperation, pubkey: &str) -> Result<String, OperationError> {
        tracing::debug!(
            correlation_id = %op.correlation_id,
            delay_ms = self.settings.propagation_delay.as_millis() as u64,
            "Waiting out propagation delay"
        );
        tokio::time::sleep(self.settings.propagation_delay).await;

        let unsigned = self.timed("compose", self.compose(op, pubkey)).await?;

        let signed = self
            .timed("sign", sign_blocking(Arc::clone(&self.signer), unsigned, op.passphrase.clone()))
            .await?;
        self.store
            .update_signed_raw(op.kind, &op.access_key, &op.correlation_id, &signed)
            .await?;

        let txid = if self.settings.environment.skips_broadcast() {
            tracing::debug!(correlation_id = %op.correlation_id, "Skipping broadcast outside production");
            BROADCAST_SENTINEL.to_string()
        } else {
            self.timed("broadcast", self.broadcaster.broadcast(&signed)).await?
        };

        self.store
            .update_complete(op.kind, &op.access_key, &op.correlation_id, &txid)
            .await?;
        Ok(txid)
    }

    async fn compose(&self, op: &AcceptedOperation, pubkey: &str) -> LedgerResult<String> {
        match &op.step {
            ComposeStep::Send {
                destination,
                asset,
                quantity,
            } => {
                let params = SendParams {
                    source: op.source.clone(),
                    destination: destination.clone(),
                    asset: asset.clone(),
                    quantity: *quantity,
                    pubkey: pubkey.to_string(),
                };
                self.composer.compose_send(&params).await
            }
            ComposeStep::Issuance {
                asset,
                description,
                quantity,
                divisible,
            } => {
                let params = IssuanceParams {
                    source: op.source.clone(),
                    asset: asset.clone(),
                    quantity: *quantity,
                    divisible: *divisible,
                    description: description.clone(),
                    pubkey: pubkey.to_string(),
                };
                self.composer.compose_issuance(&params).await
            }
            ComposeStep::Dividend {
                asset,
                dividend_asset,
                quantity_per_unit,
            } => {
                let params = DividendParams {
                    source: op.source.clone(),
                    asset: asset.clone(),
                    dividend_asset: dividend_asset.clone(),
                    quantity_per_unit: *quantity_per_unit,
                    pubkey: pubkey.to_string(),
                };
                self.composer.compose_dividend(&params).await
            }
        }
    }

    async fn timed<T, E, F>(&self, step: &'static str, fut: F) -> Result<T, OperationError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<OperationError>,
    {
        let start = Instant::now();
        let result = match timeout(self.settings.step_timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(OperationError::Timeout {
                step,
                secs: self.settings.step_timeout.as_secs(),
            }),
        };
        metrics::record_step(step, start);
        result
    }
}

async fn sign_blocking(
    signer: Arc<TransactionSigner>,
    unsigned: String,
    passphrase: Passphrase,
) -> Result<String, OperationError> {
    tokio::task::spawn_blocking(move || signer.sign(&unsigned, &passphrase))
        .await
        .map_err(|e| OperationError::TaskFailed(e.to_string()))?
        .map_err(OperationError::from)
}

fn require(field: &str, value: &str) -> Result<(), OperationError> {
    if value.trim().is_empty() {
        return Err(OperationError::InvalidRequest(format!("{} is required", field)));
    }
    Ok(())
}

fn require_positive(field: &str, value: u64) -> Result<(), OperationError> {
    if value == 0 {
        return Err(OperationError::InvalidRequest(format!("{} must be greater than zero", field)));
    }
    Ok(())
}

fn validate_correlation_id(id: &str) -> Result<String, OperationError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_CORRELATION_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(OperationError::InvalidRequest(format!(
            "correlation id must be 1-{} characters of [A-Za-z0-9_-]",
            MAX_CORRELATION_ID_LEN
        )));
    }
    Ok(id.to_string())
}
