//! SQLite schema for the operation store.

use rusqlite::Connection;

use crate::persistence::types::{StoreError, StoreResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

const OPERATIONS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS operations (
    kind            TEXT    NOT NULL,
    correlation_id  TEXT    NOT NULL,
    access_key      TEXT    NOT NULL,
    source_address  TEXT    NOT NULL,
    destination     TEXT,
    asset           TEXT,
    dividend_asset  TEXT,
    quantity        INTEGER NOT NULL,
    divisible       INTEGER,
    description     TEXT,
    status          TEXT    NOT NULL,
    error           TEXT,
    signed_raw      TEXT,
    broadcast_tx_id TEXT,
    tag             TEXT,
    created_at      INTEGER NOT NULL,
    updated_at      INTEGER NOT NULL,
    PRIMARY KEY (kind, correlation_id)
);
CREATE INDEX IF NOT EXISTS idx_operations_access_key ON operations (access_key);
CREATE INDEX IF NOT EXISTS idx_operations_status ON operations (status);
"#;

/// Create or upgrade the schema.
pub fn init_schema(conn: &Connection) -> StoreResult<()> {
    let current = schema_version(conn)?;

    if current == 0 {
        tracing::info!(version = SCHEMA_VERSION, "Creating operation store schema");
        conn.execute_batch(OPERATIONS_SCHEMA)
            .map_err(|e| StoreError::Storage(format!("Failed to create tables: {}", e)))?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current > SCHEMA_VERSION {
        return Err(StoreError::Storage(format!(
            "Database schema v{} is newer than supported v{}",
            current, SCHEMA_VERSION
        )));
    } else {
        tracing::debug!(version = current, "Operation store schema is up to date");
    }

    Ok(())
}

fn schema_version(conn: &Connection) -> StoreResult<i32> {
    conn.execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)", [])
        .map_err(|e| StoreError::Storage(format!("Failed to create schema_version table: {}", e)))?;

    match conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0)) {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(StoreError::Storage(format!("Failed to read schema_version: {}", e))),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> StoreResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| StoreError::Storage(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(|e| StoreError::Storage(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        set_schema_version(&conn, SCHEMA_VERSION + 1).unwrap();
        assert!(matches!(init_schema(&conn), Err(StoreError::Storage(_))));
    }
}
