//! SQLite-backed operation store.
//!
//! rusqlite is synchronous; every call runs on the blocking pool with the
//! connection behind a mutex. WAL mode keeps readers off the writer's back.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::persistence::schema;
use crate::persistence::types::{
    unix_now, NewOperation, OperationKind, OperationRecord, OperationStatus, StoreError, StoreResult,
};
use crate::persistence::OperationStore;

const SELECT_COLUMNS: &str = "kind, correlation_id, access_key, source_address, destination, asset, \
     dividend_asset, quantity, divisible, description, status, error, signed_raw, broadcast_tx_id, tag, \
     created_at, updated_at";

/// Durable operation store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        tracing::info!(path = %path.display(), "Opening operation store");
        let conn = Connection::open(path).map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {}", e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout=5000;")
            .map_err(|e| StoreError::Storage(format!("Failed to set PRAGMA: {}", e)))?;

        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Storage(format!("Failed to open in-memory SQLite: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Storage(format!("Lock poisoned: {}", e)))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Storage(format!("Store task failed: {}", e)))?
    }

    async fn update(
        &self,
        kind: OperationKind,
        access_key: &str,
        correlation_id: &str,
        set_clause: &'static str,
        value: String,
    ) -> StoreResult<()> {
        let access_key = access_key.to_string();
        let correlation_id = correlation_id.to_string();

        self.run(move |conn| {
            let sql = format!(
                "UPDATE operations SET {}, updated_at = ?1 WHERE kind = ?3 AND correlation_id = ?4 AND access_key = ?5",
                set_clause
            );
            let changed = conn
                .execute(
                    &sql,
                    params![to_sql_int(unix_now())?, value, kind.as_str(), correlation_id, access_key],
                )
                .map_err(|e| StoreError::Storage(format!("Update failed: {}", e)))?;

            if changed == 0 {
                return Err(StoreError::NotFound { kind, correlation_id });
            }
            Ok(())
        })
        .await
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

fn to_sql_int(value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::Storage(format!("{} exceeds the SQLite integer range", value)))
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<(OperationRecord, String, String)> {
    let quantity: i64 = row.get(7)?;
    let created_at: i64 = row.get(15)?;
    let updated_at: i64 = row.get(16)?;
    let kind: String = row.get(0)?;
    let status: String = row.get(10)?;

    let record = OperationRecord {
        // kind and status are parsed by the caller
        kind: OperationKind::Payment,
        correlation_id: row.get(1)?,
        access_key: row.get(2)?,
        source_address: row.get(3)?,
        destination: row.get(4)?,
        asset: row.get(5)?,
        dividend_asset: row.get(6)?,
        quantity: quantity.max(0) as u64,
        divisible: row.get(8)?,
        description: row.get(9)?,
        status: OperationStatus::Valid,
        error: row.get(11)?,
        signed_raw: row.get(12)?,
        broadcast_tx_id: row.get(13)?,
        tag: row.get(14)?,
        created_at: created_at.max(0) as u64,
        updated_at: updated_at.max(0) as u64,
    };
    Ok((record, kind, status))
}

#[async_trait]
impl OperationStore for SqliteStore {
    async fn insert(&self, op: NewOperation) -> StoreResult<()> {
        self.run(move |conn| {
            let record = OperationRecord::accepted(op);
            let result = conn.execute(
                "INSERT INTO operations (kind, correlation_id, access_key, source_address, destination, asset, \
                 dividend_asset, quantity, divisible, description, status, tag, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    record.kind.as_str(),
                    record.correlation_id,
                    record.access_key,
                    record.source_address,
                    record.destination,
                    record.asset,
                    record.dividend_asset,
                    to_sql_int(record.quantity)?,
                    record.divisible,
                    record.description,
                    record.status.as_str(),
                    record.tag,
                    to_sql_int(record.created_at)?,
                    to_sql_int(record.updated_at)?,
                ],
            );

            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
                    Err(StoreError::Duplicate {
                        kind: record.kind,
                        correlation_id: record.correlation_id,
                    })
                }
                Err(e) => Err(StoreError::Storage(format!("Insert failed: {}", e))),
            }
        })
        .await
    }

    async fn update_with_error(
        &self,
        kind: OperationKind,
        access_key: &str,
        correlation_id: &str,
        description: &str,
    ) -> StoreResult<()> {
        self.update(
            kind,
            access_key,
            correlation_id,
            "status = 'error', error = ?2",
            description.to_string(),
        )
        .await
    }

    async fn update_signed_raw(
        &self,
        kind: OperationKind,
        access_key: &str,
        correlation_id: &str,
        signed_hex: &str,
    ) -> StoreResult<()> {
        self.update(kind, access_key, correlation_id, "signed_raw = ?2", signed_hex.to_string())
            .await
    }

    async fn update_complete(
        &self,
        kind: OperationKind,
        access_key: &str,
        correlation_id: &str,
        broadcast_tx_id: &str,
    ) -> StoreResult<()> {
        self.update(
            kind,
            access_key,
            correlation_id,
            "status = 'complete', broadcast_tx_id = ?2",
            broadcast_tx_id.to_string(),
        )
        .await
    }

    async fn get(&self, kind: OperationKind, access_key: &str, correlation_id: &str) -> StoreResult<OperationRecord> {
        let access_key = access_key.to_string();
        let correlation_id = correlation_id.to_string();

        self.run(move |conn| {
            let sql = format!(
                "SELECT {} FROM operations WHERE kind = ?1 AND correlation_id = ?2 AND access_key = ?3",
                SELECT_COLUMNS
            );
            let row = conn
                .query_row(&sql, params![kind.as_str(), correlation_id, access_key], from_row)
                .optional()
                .map_err(|e| StoreError::Storage(format!("Query failed: {}", e)))?;

            match row {
                Some((mut record, kind_text, status_text)) => {
                    record.kind = kind_text.parse()?;
                    record.status = status_text.parse()?;
                    Ok(record)
                }
                None => Ok(OperationRecord::not_found(kind, &access_key, &correlation_id)),
            }
        })
        .await
    }
}
