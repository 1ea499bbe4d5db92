//! Delegated-operation coordination.
//!
//! # Data Flow
//! ```text
//! http handler
//!     → dispatcher.rs (permit, accept, spawn)
//!         → coordinator.accept (validate, correlation id, insert valid record)
//!     ← 202 + correlation id
//!
//! spawned task
//!     → coordinator.execute
//!         → KeyDeriver (source pubkey)           ─ failure: record error, no lock
//!         → locks.rs (per-address lock)
//!         → propagation delay
//!         → TransactionComposer → TransactionSigner → update_signed_raw
//!         → Broadcaster (or sentinel outside production)
//!         → update_complete | update_with_error
//!         → lock released
//!     → completion channel
//! ```

pub mod activation;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod locks;
pub mod operations;

pub use activation::{CustodialWallet, StaticWalletPool, WalletPool};
pub use coordinator::{Collaborators, Coordinator, CoordinatorSettings, BROADCAST_SENTINEL};
pub use dispatcher::{DispatchError, Dispatcher, Submitted};
pub use error::OperationError;
pub use locks::AddressLockTable;
pub use operations::{
    AcceptedOperation, ActivationRequest, AssetRequest, DividendRequest, OperationRequest, PaymentRequest,
};
