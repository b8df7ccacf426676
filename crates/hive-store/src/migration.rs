//! Database schema migrations for SQLite.
//!
//! Versions applied so far are recorded in `schema_migrations`; opening a
//! database applies whatever steps it is missing inside one transaction.

use rusqlite::Connection;

use hive_core::now_millis;

use crate::error::{Result, StoreError};

/// Schema steps, in order. Step `i` takes the schema from version `i` to
/// `i + 1`; released steps are never edited.
const MIGRATIONS: &[&str] = &[
    // v1: one row per item per hive; tombstones stay as rows
    r#"
    CREATE TABLE items (
        hive_id BLOB NOT NULL,            -- 16 bytes
        guid TEXT NOT NULL,               -- hyphenated uuid
        record BLOB NOT NULL,             -- CBOR item record
        version INTEGER NOT NULL,         -- 0 when the item has no sync metadata
        deleted INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL,      -- local write time (Unix ms)

        PRIMARY KEY (hive_id, guid)
    );

    CREATE INDEX idx_items_updated ON items(hive_id, updated_at);
    "#,
];

/// Current schema version.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

/// Bring the schema up to [`CURRENT_VERSION`].
///
/// Running it against an up-to-date database does nothing. A database
/// written by a newer release is refused rather than touched.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
    )?;

    let applied: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    let pending = MIGRATIONS.get(applied as usize..).ok_or_else(|| {
        StoreError::Migration(format!(
            "database schema v{} is newer than supported v{}",
            applied, CURRENT_VERSION
        ))
    })?;
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, sql) in (applied + 1..).zip(pending) {
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, now_millis()],
        )?;
        tracing::debug!(version, "applied schema migration");
    }
    tx.commit()?;

    Ok(())
}
