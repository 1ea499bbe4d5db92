//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request id, timeout, body limit, tracing)
//!     → request.rs (x-access-key, camelCase bodies)
//!     → handlers.rs (submit to the dispatcher | read the record)
//!     → response.rs (202 acknowledgement, record JSON, error mapping)
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{AccessKey, X_ACCESS_KEY};
pub use server::{build_router, AppState, HttpServer};
