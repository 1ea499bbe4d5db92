//! Chain-specific error definitions.

use thiserror::Error;

use crate::rpc::RpcError;

/// Errors from mnemonic decoding and hierarchical derivation.
#[derive(Debug, Clone, Error)]
pub enum KeyError {
    /// The passphrase is not a valid word-list mnemonic.
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// A derivation step produced an invalid key.
    #[error("Key derivation failed: {0}")]
    Derivation(String),

    /// The address is not among the searched leaves of this mnemonic.
    #[error("No key for address {address} within the first {searched} derived addresses")]
    KeyNotFound { address: String, searched: u32 },
}

/// Result type for key derivation.
pub type KeyResult<T> = Result<T, KeyError>;

/// Errors from transaction signing.
#[derive(Debug, Clone, Error)]
pub enum SignError {
    /// Bad hex or malformed wire format.
    #[error("Failed to decode transaction: {0}")]
    Decode(String),

    /// An input is not pay-to-public-key-hash.
    #[error("Unsupported script type {class} on input {input}; only pay-to-pubkey-hash inputs can be signed")]
    UnsupportedScriptType { input: usize, class: &'static str },

    /// The passphrase does not own the address funding an input.
    #[error("No signing key available for input {input} ({address})")]
    KeyNotFound { input: usize, address: String },

    /// Mnemonic or derivation failure while looking up keys.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Sighash or unlocking script could not be built.
    #[error("Failed to construct signature for input {input}: {reason}")]
    SignatureConstruction { input: usize, reason: String },

    /// The signed transaction failed its own script check.
    #[error("Signed input {input} failed script verification: {reason}")]
    ScriptVerification { input: usize, reason: String },
}

/// Result type for signing.
pub type SignResult<T> = Result<T, SignError>;

/// Errors from the node RPC.
#[derive(Debug, Clone, Error)]
pub enum NodeError {
    /// The signed transaction could not be decoded locally.
    #[error("Failed to decode signed transaction: {0}")]
    Decode(String),

    /// The node refused the transaction.
    #[error("Broadcast rejected: {0}")]
    Broadcast(String),

    /// Any other RPC failure.
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Result type for node operations.
pub type NodeResult<T> = Result<T, NodeError>;
