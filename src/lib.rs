//! Delegated transaction relay library.

pub mod blockchain;
pub mod config;
pub mod coordination;
pub mod http;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod persistence;
pub mod resilience;
pub mod rpc;

pub use config::schema::RelayConfig;
pub use coordination::{Coordinator, Dispatcher};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
