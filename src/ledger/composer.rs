//! Transaction composition over the Counterparty JSON-RPC API.
//!
//! # Responsibilities
//! - Build unsigned send / issuance / dividend transactions remotely
//! - Generate numeric asset names for anonymous issuances
//! - Ledger status and balance queries used by monitoring

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::LedgerConfig;
use crate::ledger::asset::{generate_numeric_asset_name, truncate_description};
use crate::ledger::error::{LedgerError, LedgerResult};
use crate::ledger::types::{Balance, DividendParams, IssuanceParams, Issuance, RunningInfo, SendParams};
use crate::resilience::RetryPolicy;
use crate::rpc::{JsonRpcClient, JsonRpcVersion};

/// Builds unsigned transactions. Every method returns the wire-format hex.
#[async_trait]
pub trait TransactionComposer: Send + Sync {
    async fn compose_send(&self, params: &SendParams) -> LedgerResult<String>;

    async fn compose_issuance(&self, params: &IssuanceParams) -> LedgerResult<String>;

    async fn compose_dividend(&self, params: &DividendParams) -> LedgerResult<String>;

    /// Issue under a freshly generated numeric asset name.
    ///
    /// Returns `(asset_name, unsigned_hex)`.
    async fn compose_numeric_issuance(
        &self,
        source: &str,
        description: &str,
        quantity: u64,
        divisible: bool,
        pubkey: &str,
    ) -> LedgerResult<(String, String)> {
        let params = IssuanceParams {
            source: source.to_string(),
            asset: generate_numeric_asset_name(),
            quantity,
            divisible,
            description: truncate_description(description).to_string(),
            pubkey: pubkey.to_string(),
        };
        let unsigned = self.compose_issuance(&params).await?;
        Ok((params.asset, unsigned))
    }
}

/// Counterparty server client.
#[derive(Debug, Clone)]
pub struct CounterpartyClient {
    rpc: JsonRpcClient,
}

impl CounterpartyClient {
    pub fn new(config: &LedgerConfig, retry: RetryPolicy) -> Self {
        let rpc = JsonRpcClient::new(
            &config.rpc_url,
            &config.rpc_user,
            &config.rpc_password,
            JsonRpcVersion::V2,
            Duration::from_secs(config.rpc_timeout_secs),
        )
        .with_retry(retry);
        Self { rpc }
    }

    pub fn endpoint(&self) -> &str {
        self.rpc.endpoint()
    }

    /// Ledger sync state.
    pub async fn get_running_info(&self) -> LedgerResult<RunningInfo> {
        Ok(self.rpc.call("get_running_info", json!({})).await?)
    }

    /// All balances held by `address`.
    pub async fn get_balances(&self, address: &str) -> LedgerResult<Vec<Balance>> {
        let params = json!({
            "filters": [{"field": "address", "op": "==", "value": address}],
        });
        Ok(self.rpc.call("get_balances", params).await?)
    }

    /// Valid issuances of `asset`, oldest first.
    pub async fn get_issuances(&self, asset: &str) -> LedgerResult<Vec<Issuance>> {
        let params = json!({
            "filters": [
                {"field": "asset", "op": "==", "value": asset},
                {"field": "status", "op": "==", "value": "valid"},
            ],
            "order_by": "tx_index",
            "order_dir": "asc",
        });
        Ok(self.rpc.call("get_issuances", params).await?)
    }

    async fn create(&self, method: &str, params: Value) -> LedgerResult<String> {
        let unsigned: String = self.rpc.call(method, params).await?;
        if unsigned.is_empty() {
            return Err(LedgerError::InvalidRequest(format!("{} returned an empty transaction", method)));
        }
        tracing::debug!(method = method, bytes = unsigned.len() / 2, "Transaction composed");
        Ok(unsigned)
    }
}

fn require(field: &str, value: &str) -> LedgerResult<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::InvalidRequest(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[async_trait]
impl TransactionComposer for CounterpartyClient {
    async fn compose_send(&self, params: &SendParams) -> LedgerResult<String> {
        require("source", &params.source)?;
        require("destination", &params.destination)?;
        require("asset", &params.asset)?;

        self.create(
            "create_send",
            json!({
                "source": params.source,
                "destination": params.destination,
                "asset": params.asset,
                "quantity": params.quantity,
                "pubkey": params.pubkey,
                "allow_unconfirmed_inputs": true,
            }),
        )
        .await
    }

    async fn compose_issuance(&self, params: &IssuanceParams) -> LedgerResult<String> {
        require("source", &params.source)?;
        require("asset", &params.asset)?;

        self.create(
            "create_issuance",
            json!({
                "source": params.source,
                "asset": params.asset,
                "quantity": params.quantity,
                "divisible": params.divisible,
                "description": truncate_description(&params.description),
                "transfer_destination": null,
                "pubkey": params.pubkey,
                "allow_unconfirmed_inputs": true,
            }),
        )
        .await
    }

    async fn compose_dividend(&self, params: &DividendParams) -> LedgerResult<String> {
        require("source", &params.source)?;
        require("asset", &params.asset)?;
        require("dividend_asset", &params.dividend_asset)?;

        self.create(
            "create_dividend",
            json!({
                "source": params.source,
                "asset": params.asset,
                "dividend_asset": params.dividend_asset,
                "quantity_per_unit": params.quantity_per_unit,
                "pubkey": params.pubkey,
                "allow_unconfirmed_inputs": true,
            }),
        )
        .await
    }
}
