//! Counterparty ledger integration.
//!
//! # Data Flow
//! ```text
//! coordinator
//!     → composer.rs (create_send / create_issuance / create_dividend)
//!     → rpc::JsonRpcClient (JSON-RPC 2.0, Basic auth)
//!     ← unsigned transaction hex | LedgerError
//!     → error.rs (ComposeFailure::classify on the remote text)
//! ```
//!
//! # Design Decisions
//! - `TransactionComposer` is a trait so the saga can run against stubs
//! - Remote error text is interpreted in exactly one function
//! - Numeric asset ids fit in `u64`, so no big-integer arithmetic is needed

pub mod asset;
pub mod composer;
pub mod error;
pub mod types;

pub use composer::{CounterpartyClient, TransactionComposer};
pub use error::{ComposeFailure, LedgerError, LedgerResult};
pub use types::{Balance, DividendParams, Issuance, IssuanceParams, RunningInfo, SendParams};
