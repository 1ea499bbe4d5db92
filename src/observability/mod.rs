//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → Log aggregation (stdout, plain or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Correlation ids are attached as span fields on every saga
//! - Secrets (passphrases, seeds, private keys) are never recorded
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
