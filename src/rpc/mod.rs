//! JSON-RPC transport shared by the ledger composer and the node broadcaster.
//!
//! # Data Flow
//! ```text
//! ledger::CounterpartyClient ─┐
//!                             ├─→ client.rs (envelope, Basic auth, timeout, retry)
//! blockchain::BitcoinNode ────┘       → HTTP POST → remote daemon
//!                                     ← 200 + {result} | 200 + {error} | non-200 body
//! ```
//!
//! # Design Decisions
//! - Request ids are random 32-bit values from the OS CSPRNG; they only correlate
//! - A non-200 response is always an error carrying the body verbatim
//! - Only connection failures are retried; nothing that reached the daemon is re-sent

pub mod client;
pub mod types;

pub use client::{JsonRpcClient, JsonRpcVersion};
pub use types::{RpcError, RpcResult};
