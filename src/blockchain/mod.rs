//! Bitcoin-side keys, signing and broadcast.
//!
//! # Data Flow
//! ```text
//! mnemonic passphrase (per request, never stored)
//!     → keys.rs (seed, hierarchical derivation, bounded address search)
//!     → signer.rs (decode, P2PKH-only, SIGHASH_ALL, install unlocking scripts)
//!     → script.rs (self-check against the original locking scripts)
//!     → node.rs (sendrawtransaction → txid)
//! ```
//!
//! # Security Constraints
//! - Passphrases, seeds and private keys are never logged
//! - Signing is CPU-bound and runs off the async executor
//! - Every node RPC has a configurable timeout

pub mod keys;
pub mod node;
pub mod script;
pub mod signer;
pub mod types;

pub use keys::{KeyDeriver, KeyPair, Passphrase, ADDRESS_SEARCH_RANGE};
pub use node::{BitcoinNode, Broadcaster};
pub use signer::TransactionSigner;
pub use types::{KeyError, NodeError, SignError};
