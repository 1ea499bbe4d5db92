//! Errors that end an operation.

use thiserror::Error;

use crate::blockchain::{KeyError, NodeError, SignError};
use crate::ledger::{ComposeFailure, LedgerError};
use crate::persistence::StoreError;

/// Terminal failure of an operation. Its `Display` text is what gets
/// persisted on the record.
#[derive(Debug, Clone, Error)]
pub enum OperationError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("{failure}: {source}")]
    Compose {
        failure: ComposeFailure,
        #[source]
        source: LedgerError,
    },

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error(transparent)]
    Broadcast(#[from] NodeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{step} step timed out after {secs} seconds")]
    Timeout { step: &'static str, secs: u64 },

    #[error("No custodial wallet available: {0}")]
    NoCustodialWallet(String),

    #[error("Operation task failed: {0}")]
    TaskFailed(String),
}

impl From<LedgerError> for OperationError {
    fn from(source: LedgerError) -> Self {
        OperationError::Compose {
            failure: source.failure(),
            source,
        }
    }
}

impl OperationError {
    /// Short label for metrics.
    pub fn category(&self) -> &'static str {
        match self {
            OperationError::InvalidRequest(_) => "invalid_request",
            OperationError::Key(KeyError::KeyNotFound { .. }) => "key_not_found",
            OperationError::Key(_) => "key",
            OperationError::Compose { failure, .. } => failure.as_str(),
            OperationError::Sign(SignError::UnsupportedScriptType { .. }) => "unsupported_script_type",
            OperationError::Sign(_) => "sign",
            OperationError::Broadcast(_) => "broadcast",
            OperationError::Store(_) => "persistence",
            OperationError::Timeout { .. } => "timeout",
            OperationError::NoCustodialWallet(_) => "no_custodial_wallet",
            OperationError::TaskFailed(_) => "task_failed",
        }
    }
}
