//! Durable record of every accepted operation.
//!
//! # Data Flow
//! ```text
//! coordinator.accept   → insert (status = valid)
//! coordinator.execute  → update_signed_raw → update_complete
//!                      ↘ update_with_error (any failed step)
//! http GET /v1/<kind>/{id} → get (sentinel record when absent)
//! ```
//!
//! # Design Decisions
//! - Records are keyed by (kind, correlation id) and scoped to an access key
//! - Nothing is ever deleted; rows are an append-only audit trail
//! - Writes to one row are serialized by the coordinator's address lock,
//!   so backends only need to be safe for writers to distinct rows

pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{PersistenceConfig, StorageBackend};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{NewOperation, OperationKind, OperationRecord, OperationStatus, StoreError, StoreResult};

/// Storage contract consumed by the coordinator.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Insert a record with status `valid`.
    async fn insert(&self, op: NewOperation) -> StoreResult<()>;

    /// Mark the record failed with a human-readable description.
    async fn update_with_error(
        &self,
        kind: OperationKind,
        access_key: &str,
        correlation_id: &str,
        description: &str,
    ) -> StoreResult<()>;

    /// Cache the signed transaction for manual re-broadcast.
    async fn update_signed_raw(
        &self,
        kind: OperationKind,
        access_key: &str,
        correlation_id: &str,
        signed_hex: &str,
    ) -> StoreResult<()>;

    /// Mark the record complete with the network transaction id.
    async fn update_complete(
        &self,
        kind: OperationKind,
        access_key: &str,
        correlation_id: &str,
        broadcast_tx_id: &str,
    ) -> StoreResult<()>;

    /// Fetch a record. Absent records come back as [`OperationRecord::not_found`].
    async fn get(&self, kind: OperationKind, access_key: &str, correlation_id: &str) -> StoreResult<OperationRecord>;
}

/// Open the configured backend.
pub fn open_store(config: &PersistenceConfig) -> StoreResult<Arc<dyn OperationStore>> {
    match config.backend {
        StorageBackend::Sqlite => Ok(Arc::new(SqliteStore::open(Path::new(&config.sqlite_path))?)),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory operation store; records are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn sample(kind: OperationKind, correlation_id: &str, access_key: &str) -> NewOperation {
        NewOperation {
            kind,
            correlation_id: correlation_id.to_string(),
            access_key: access_key.to_string(),
            source_address: "mkHS9ne12qx9pS9VojpwU5xtRd4T7X7ZUt".to_string(),
            destination: Some("n3GNqMveyvaPvUbH469vDRadqpJMPc84JA".to_string()),
            asset: Some("XCP".to_string()),
            dividend_asset: None,
            quantity: 100_000,
            divisible: None,
            description: None,
            tag: Some("order-17".to_string()),
        }
    }

    #[test]
    fn test_open_memory_backend() {
        let config = PersistenceConfig {
            backend: StorageBackend::Memory,
            ..PersistenceConfig::default()
        };
        assert!(open_store(&config).is_ok());
    }
}
