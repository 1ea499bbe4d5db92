//! Operation records and store errors.

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;

/// Business operation a record tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Payment,
    Asset,
    Dividend,
    Activation,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Payment => "payment",
            OperationKind::Asset => "asset",
            OperationKind::Dividend => "dividend",
            OperationKind::Activation => "activation",
        }
    }

    /// Name of the correlation id field in API payloads.
    pub fn id_field(&self) -> &'static str {
        match self {
            OperationKind::Payment => "paymentId",
            OperationKind::Asset => "assetId",
            OperationKind::Dividend => "dividendId",
            OperationKind::Activation => "activationId",
        }
    }
}

impl FromStr for OperationKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment" => Ok(OperationKind::Payment),
            "asset" => Ok(OperationKind::Asset),
            "dividend" => Ok(OperationKind::Dividend),
            "activation" => Ok(OperationKind::Activation),
            other => Err(StoreError::Storage(format!("unknown operation kind '{}'", other))),
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a record. `Valid` means accepted and in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationStatus {
    #[serde(rename = "valid")]
    Valid,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "complete")]
    Complete,
    /// Sentinel returned by lookups that match nothing.
    #[serde(rename = "not found")]
    NotFound,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Valid => "valid",
            OperationStatus::Error => "error",
            OperationStatus::Complete => "complete",
            OperationStatus::NotFound => "not found",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Error | OperationStatus::Complete)
    }
}

impl FromStr for OperationStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "valid" => Ok(OperationStatus::Valid),
            "error" => Ok(OperationStatus::Error),
            "complete" => Ok(OperationStatus::Complete),
            "not found" => Ok(OperationStatus::NotFound),
            other => Err(StoreError::Storage(format!("unknown operation status '{}'", other))),
        }
    }
}

/// Fields supplied when a record is first inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOperation {
    pub kind: OperationKind,
    pub correlation_id: String,
    pub access_key: String,
    pub source_address: String,
    pub destination: Option<String>,
    pub asset: Option<String>,
    pub dividend_asset: Option<String>,
    pub quantity: u64,
    pub divisible: Option<bool>,
    pub description: Option<String>,
    pub tag: Option<String>,
}

/// One persisted business operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    pub kind: OperationKind,
    pub correlation_id: String,
    #[serde(skip_serializing)]
    pub access_key: String,
    pub source_address: String,
    pub destination: Option<String>,
    pub asset: Option<String>,
    pub dividend_asset: Option<String>,
    pub quantity: u64,
    pub divisible: Option<bool>,
    pub description: Option<String>,
    pub status: OperationStatus,
    pub error: Option<String>,
    pub signed_raw: Option<String>,
    pub broadcast_tx_id: Option<String>,
    pub tag: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl OperationRecord {
    /// A freshly accepted record.
    pub fn accepted(op: NewOperation) -> Self {
        let now = unix_now();
        Self {
            kind: op.kind,
            correlation_id: op.correlation_id,
            access_key: op.access_key,
            source_address: op.source_address,
            destination: op.destination,
            asset: op.asset,
            dividend_asset: op.dividend_asset,
            quantity: op.quantity,
            divisible: op.divisible,
            description: op.description,
            status: OperationStatus::Valid,
            error: None,
            signed_raw: None,
            broadcast_tx_id: None,
            tag: op.tag,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sentinel for a lookup that matched nothing.
    pub fn not_found(kind: OperationKind, access_key: &str, correlation_id: &str) -> Self {
        Self {
            kind,
            correlation_id: correlation_id.to_string(),
            access_key: access_key.to_string(),
            source_address: String::new(),
            destination: None,
            asset: None,
            dividend_asset: None,
            quantity: 0,
            divisible: None,
            description: None,
            status: OperationStatus::NotFound,
            error: None,
            signed_raw: None,
            broadcast_tx_id: None,
            tag: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == OperationStatus::NotFound
    }
}

/// Current time in unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Errors from the operation store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No record of this kind with this id is owned by the access key.
    #[error("No {kind} record {correlation_id} for this access key")]
    NotFound {
        kind: OperationKind,
        correlation_id: String,
    },

    /// A record with this kind and id already exists.
    #[error("Duplicate {kind} record {correlation_id}")]
    Duplicate {
        kind: OperationKind,
        correlation_id: String,
    },

    /// The backend failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
