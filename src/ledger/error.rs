//! Ledger RPC errors and the composition-failure taxonomy.

use thiserror::Error;

use crate::rpc::RpcError;

/// Stable categories for a rejected composition.
///
/// The ledger daemon only reports free text; [`ComposeFailure::classify`] is
/// the one place that text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeFailure {
    InsufficientFunds,
    InsufficientFees,
    MalformedAddress,
    NoSuchAsset,
    DividendIssuerOnly,
    Other,
}

impl ComposeFailure {
    /// Best-effort, case-insensitive substring classification.
    pub fn classify(detail: &str) -> Self {
        let detail = detail.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| detail.contains(n));

        if has(&["insufficient funds"]) {
            ComposeFailure::InsufficientFunds
        } else if has(&["insufficient bitcoins", "insufficient btc", "insufficient fee"]) {
            ComposeFailure::InsufficientFees
        } else if has(&["invalid address", "malformed address", "invalid base58", "invalid checksum"]) {
            ComposeFailure::MalformedAddress
        } else if has(&["no such asset"]) {
            ComposeFailure::NoSuchAsset
        } else if has(&["only issuer"]) {
            ComposeFailure::DividendIssuerOnly
        } else {
            ComposeFailure::Other
        }
    }

    /// Short label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComposeFailure::InsufficientFunds => "insufficient_funds",
            ComposeFailure::InsufficientFees => "insufficient_fees",
            ComposeFailure::MalformedAddress => "malformed_address",
            ComposeFailure::NoSuchAsset => "no_such_asset",
            ComposeFailure::DividendIssuerOnly => "dividend_issuer_only",
            ComposeFailure::Other => "other",
        }
    }
}

impl std::fmt::Display for ComposeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            ComposeFailure::InsufficientFunds => "Insufficient funds in the source address",
            ComposeFailure::InsufficientFees => "Insufficient BTC in the source address to pay fees",
            ComposeFailure::MalformedAddress => "Malformed address",
            ComposeFailure::NoSuchAsset => "No such asset",
            ComposeFailure::DividendIssuerOnly => "Only the asset issuer can pay dividends",
            ComposeFailure::Other => "Transaction composition failed",
        };
        f.write_str(message)
    }
}

/// Errors from the ledger RPC.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Rejected locally before any RPC was made.
    #[error("Invalid ledger request: {0}")]
    InvalidRequest(String),
}

impl LedgerError {
    /// Category of a failed composition.
    pub fn failure(&self) -> ComposeFailure {
        match self {
            LedgerError::Rpc(e) => e.remote_detail().map(ComposeFailure::classify).unwrap_or(ComposeFailure::Other),
            LedgerError::InvalidRequest(_) => ComposeFailure::Other,
        }
    }
}

/// Result type for ledger calls.
pub type LedgerResult<T> = Result<T, LedgerError>;
