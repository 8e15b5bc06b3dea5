//! SQLite schema definition.

/// Complete database schema for dental records.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Key-Value Store
-- ============================================================================

-- One row per storage key; values are opaque text (JSON snapshots, counters).
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_key_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute("INSERT INTO kv_store (key, value) VALUES ('a', '1')", [])
            .unwrap();
        let result = conn.execute("INSERT INTO kv_store (key, value) VALUES ('a', '2')", []);
        assert!(result.is_err());
    }
}
