//! Key-value database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};

impl Database {
    /// Read the value stored under `key`.
    pub fn get(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv_store WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Into::into)
    }

    /// Store several values atomically.
    pub fn put_entries(&self, entries: &[(&str, &str)]) -> DbResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO kv_store (key, value, updated_at)
                VALUES (?1, ?2, datetime('now'))
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
            )?;
            for (key, value) in entries {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
