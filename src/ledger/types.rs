//! Ledger request parameters and query results.

use serde::{Deserialize, Serialize};

/// Parameters of a value transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendParams {
    pub source: String,
    pub destination: String,
    pub asset: String,
    pub quantity: u64,
    /// Hex-encoded compressed public key of `source`.
    pub pubkey: String,
}

/// Parameters of an asset issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceParams {
    pub source: String,
    pub asset: String,
    pub quantity: u64,
    pub divisible: bool,
    pub description: String,
    pub pubkey: String,
}

/// Parameters of a dividend distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendParams {
    pub source: String,
    pub asset: String,
    pub dividend_asset: String,
    pub quantity_per_unit: u64,
    pub pubkey: String,
}

/// Last block the ledger has parsed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LastBlock {
    pub block_index: u64,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub block_time: Option<u64>,
}

/// Result of `get_running_info`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunningInfo {
    #[serde(default)]
    pub db_caught_up: bool,
    #[serde(default)]
    pub bitcoin_block_count: Option<u64>,
    #[serde(default)]
    pub last_block: Option<LastBlock>,
    #[serde(default)]
    pub running_testnet: bool,
    #[serde(default)]
    pub version_major: Option<u32>,
    #[serde(default)]
    pub version_minor: Option<u32>,
}

impl RunningInfo {
    /// Blocks the ledger trails the node by, if both heights are known.
    pub fn block_lag(&self) -> Option<u64> {
        let node = self.bitcoin_block_count?;
        let ledger = self.last_block.as_ref()?.block_index;
        Some(node.saturating_sub(ledger))
    }
}

/// One row of `get_balances`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub address: String,
    pub asset: String,
    pub quantity: u64,
}

/// One row of `get_issuances`.
#[derive(Debug, Clone, Deserialize)]
pub struct Issuance {
    pub tx_index: u64,
    pub tx_hash: String,
    pub block_index: u64,
    pub asset: String,
    pub quantity: u64,
    pub divisible: bool,
    pub source: String,
    pub issuer: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub locked: bool,
    pub status: String,
}
