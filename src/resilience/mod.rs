//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! JSON-RPC call:
//!     → tokio::time::timeout (per call deadline)
//!     → on transport failure: backoff.rs (jittered exponential delay, bounded attempts)
//! Saga step:
//!     → tokio::time::timeout (per step deadline, see coordination)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline; a hung RPC must not pin an address lock forever
//! - Only transport failures are retried; an RPC that answered is never re-sent

pub mod backoff;

pub use backoff::{calculate_backoff, RetryPolicy};
