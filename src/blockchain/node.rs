//! Bitcoin node RPC: broadcasting and a few wallet helpers.
//!
//! # Responsibilities
//! - Submit signed transactions (`sendrawtransaction`)
//! - Chain-tip and wallet queries used by the monitor and startup checks
//! - Map daemon rejections to `NodeError::Broadcast`

use std::time::Duration;

use async_trait::async_trait;
use bitcoin::Amount;
use serde_json::{json, Value};

use crate::blockchain::signer::decode_transaction;
use crate::blockchain::types::{NodeError, NodeResult};
use crate::config::NodeConfig;
use crate::resilience::RetryPolicy;
use crate::rpc::types::error_text;
use crate::rpc::{JsonRpcClient, JsonRpcVersion, RpcError};

/// Publishes signed transactions to the network.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Submit `signed_hex` and return the transaction id the node reports.
    async fn broadcast(&self, signed_hex: &str) -> NodeResult<String>;
}

/// bitcoind JSON-RPC client.
#[derive(Debug, Clone)]
pub struct BitcoinNode {
    rpc: JsonRpcClient,
}

impl BitcoinNode {
    pub fn new(config: &NodeConfig, retry: RetryPolicy) -> Self {
        let rpc = JsonRpcClient::new(
            &config.rpc_url,
            &config.rpc_user,
            &config.rpc_password,
            JsonRpcVersion::V1,
            Duration::from_secs(config.rpc_timeout_secs),
        )
        .with_retry(retry);
        Self { rpc }
    }

    /// Ask the node wallet for a fresh receiving address.
    pub async fn get_new_address(&self) -> NodeResult<String> {
        Ok(self.rpc.call("getnewaddress", json!([])).await?)
    }

    /// Confirmed balance of the node wallet.
    pub async fn get_balance(&self) -> NodeResult<Amount> {
        let btc: f64 = self.rpc.call("getbalance", json!([])).await?;
        Amount::from_btc(btc).map_err(|e| NodeError::Decode(format!("balance {}: {}", btc, e)))
    }

    /// Height of the node's best chain.
    pub async fn get_block_count(&self) -> NodeResult<u64> {
        Ok(self.rpc.call("getblockcount", json!([])).await?)
    }

    /// Submit a raw transaction without local checks.
    pub async fn send_raw_transaction(&self, signed_hex: &str) -> NodeResult<String> {
        match self.rpc.call("sendrawtransaction", json!([signed_hex])).await {
            Ok(txid) => Ok(txid),
            Err(RpcError::Remote { message, .. }) => Err(NodeError::Broadcast(message)),
            Err(RpcError::Http { status, body }) => match rejection_reason(&body) {
                Some(reason) => Err(NodeError::Broadcast(reason)),
                None => Err(RpcError::Http { status, body }.into()),
            },
            Err(e) => Err(e.into()),
        }
    }
}

/// bitcoind answers rejected calls with HTTP 500 and a regular envelope.
fn rejection_reason(body: &str) -> Option<String> {
    let envelope: Value = serde_json::from_str(body).ok()?;
    match envelope.get("error") {
        Some(error) if !error.is_null() => Some(error_text(error)),
        _ => None,
    }
}

#[async_trait]
impl Broadcaster for BitcoinNode {
    async fn broadcast(&self, signed_hex: &str) -> NodeResult<String> {
        let tx = decode_transaction(signed_hex).map_err(NodeError::Decode)?;
        let txid = self.send_raw_transaction(signed_hex).await?;

        tracing::info!(txid = %txid, local_txid = %tx.compute_txid(), "Transaction broadcast");
        Ok(txid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> BitcoinNode {
        let config = NodeConfig {
            rpc_url: "http://127.0.0.1:9/".to_string(),
            ..NodeConfig::default()
        };
        BitcoinNode::new(&config, RetryPolicy::none())
    }

    #[tokio::test]
    async fn test_broadcast_rejects_undecodable_hex() {
        // Decoding fails before any RPC is attempted
        let result = node().broadcast("not-hex").await;
        assert!(matches!(result, Err(NodeError::Decode(_))));
    }

    #[test]
    fn test_rejection_reason_from_error_body() {
        let body = r#"{"result":null,"error":{"code":-26,"message":"min relay fee not met"},"id":1}"#;
        assert_eq!(rejection_reason(body).as_deref(), Some("min relay fee not met"));
        assert!(rejection_reason(r#"{"result":"ab","error":null}"#).is_none());
        assert!(rejection_reason("<html>401 Unauthorized</html>").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_node_is_rpc_error() {
        let result = node().get_block_count().await;
        assert!(matches!(result, Err(NodeError::Rpc(_))));
    }
}
