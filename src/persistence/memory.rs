//! In-process operation store for development and tests.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::persistence::types::{
    unix_now, NewOperation, OperationKind, OperationRecord, OperationStatus, StoreError, StoreResult,
};
use crate::persistence::OperationStore;

/// DashMap-backed store; shards give concurrent writers to distinct rows.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<(OperationKind, String), OperationRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn update<F>(&self, kind: OperationKind, access_key: &str, correlation_id: &str, f: F) -> StoreResult<()>
    where
        F: FnOnce(&mut OperationRecord),
    {
        match self.records.get_mut(&(kind, correlation_id.to_string())) {
            Some(mut record) if record.access_key == access_key => {
                f(&mut record);
                record.updated_at = unix_now();
                Ok(())
            }
            _ => Err(StoreError::NotFound {
                kind,
                correlation_id: correlation_id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl OperationStore for MemoryStore {
    async fn insert(&self, op: NewOperation) -> StoreResult<()> {
        use dashmap::mapref::entry::Entry;

        match self.records.entry((op.kind, op.correlation_id.clone())) {
            Entry::Occupied(_) => Err(StoreError::Duplicate {
                kind: op.kind,
                correlation_id: op.correlation_id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(OperationRecord::accepted(op));
                Ok(())
            }
        }
    }

    async fn update_with_error(
        &self,
        kind: OperationKind,
        access_key: &str,
        correlation_id: &str,
        description: &str,
    ) -> StoreResult<()> {
        self.update(kind, access_key, correlation_id, |record| {
            record.status = OperationStatus::Error;
            record.error = Some(description.to_string());
        })
    }

    async fn update_signed_raw(
        &self,
        kind: OperationKind,
        access_key: &str,
        correlation_id: &str,
        signed_hex: &str,
    ) -> StoreResult<()> {
        self.update(kind, access_key, correlation_id, |record| {
            record.signed_raw = Some(signed_hex.to_string());
        })
    }

    async fn update_complete(
        &self,
        kind: OperationKind,
        access_key: &str,
        correlation_id: &str,
        broadcast_tx_id: &str,
    ) -> StoreResult<()> {
        self.update(kind, access_key, correlation_id, |record| {
            record.status = OperationStatus::Complete;
            record.broadcast_tx_id = Some(broadcast_tx_id.to_string());
        })
    }

    async fn get(&self, kind: OperationKind, access_key: &str, correlation_id: &str) -> StoreResult<OperationRecord> {
        Ok(self
            .records
            .get(&(kind, correlation_id.to_string()))
            .filter(|record| record.access_key == access_key)
            .map(|record| record.value().clone())
            .unwrap_or_else(|| OperationRecord::not_found(kind, access_key, correlation_id)))
    }
}
