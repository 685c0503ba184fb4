use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

/// Apply connection PRAGMAs and create tables. Safe to run on every open.
pub fn initialize(conn: &Connection) -> Result<()> {
    // Readers (CLI queries) keep working while the server saves.
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    // A second process waits up to 5s for the write lock instead of failing
    // with SQLITE_BUSY.
    conn.pragma_update(None, "busy_timeout", 5000)?;
    // Checkpoint every 100 pages (~400KB) instead of the default 1000, so a
    // full save does not leave a large WAL behind.
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    // Fold WAL left over from an unclean exit into the main file and
    // truncate it. In-memory and fresh databases legitimately fail this.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::debug!("startup WAL checkpoint complete");
    }

    // `record` holds the full node as JSON; the other columns are copies
    // for SQL-side filtering and inspection. `snapshot` is set only for
    // dormant nodes.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS nodes (
            id            TEXT PRIMARY KEY,
            partition     TEXT NOT NULL,
            price_center  REAL NOT NULL,
            half_width    REAL NOT NULL,
            side          TEXT NOT NULL,
            strength      REAL NOT NULL,
            first_seen_ts REAL NOT NULL,
            record        TEXT NOT NULL,
            snapshot      TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_nodes_partition ON nodes(partition);
        CREATE INDEX IF NOT EXISTS idx_nodes_price ON nodes(price_center);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}
