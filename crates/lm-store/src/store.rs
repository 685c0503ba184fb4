use std::path::Path;

use lm_core::{
    ContinuityStore, DormantSnapshot, MemoryConfig, MemoryNode, NodeEntry, Partition,
    PartitionCounts,
};
use rusqlite::{Connection, params};

use crate::error::{Result, StoreError};
use crate::schema;

const CONFIG_KEY: &str = "memory_config";
const SAVED_AT_KEY: &str = "saved_at";

/// SQLite-backed persistence for a continuity store.
///
/// One row per node; the full node record and dormant snapshot are JSON
/// columns, with partition, price and strength duplicated into plain
/// columns for filtering.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let val = stmt.query_row([key], |row| row.get(0)).ok();
        Ok(val)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Replace the persisted state with `memory`, atomically.
    pub fn save_memory(&self, memory: &ContinuityStore) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute("DELETE FROM nodes", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO nodes
                 (id, partition, price_center, half_width, side, strength, first_seen_ts, record, snapshot)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for entry in memory.entries() {
                let node = &entry.node;
                let record = serde_json::to_string(node)?;
                let snapshot = entry
                    .snapshot
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                insert.execute(params![
                    node.id.to_string(),
                    entry.partition.as_str(),
                    node.price_center,
                    node.half_width,
                    node.side.as_str(),
                    node.strength,
                    node.first_seen_ts,
                    record,
                    snapshot,
                ])?;
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![CONFIG_KEY, serde_json::to_string(memory.config())?],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![SAVED_AT_KEY, lm_core::time::now_iso8601()],
        )?;
        tx.commit()?;

        tracing::info!(nodes = memory.len(), "saved liquidity memory");
        Ok(())
    }

    /// Load the persisted state. An empty database yields an empty store
    /// using `fallback` as its configuration.
    pub fn load_memory(&self, fallback: &MemoryConfig) -> Result<ContinuityStore> {
        let config = match self.get_metadata(CONFIG_KEY)? {
            Some(json) => serde_json::from_str(&json)?,
            None => fallback.clone(),
        };

        let mut stmt = self
            .conn
            .prepare("SELECT id, partition, record, snapshot FROM nodes ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (id, partition, record, snapshot) in rows {
            let node: MemoryNode = serde_json::from_str(&record)?;
            if node.id.to_string() != id {
                return Err(StoreError::InvalidData(format!(
                    "row {id} holds node {}",
                    node.id
                )));
            }
            let partition = Partition::parse(&partition).ok_or_else(|| {
                StoreError::InvalidData(format!("unknown partition '{partition}' for {id}"))
            })?;
            let snapshot = snapshot
                .map(|s| serde_json::from_str::<DormantSnapshot>(&s))
                .transpose()?;
            entries.push(NodeEntry {
                node,
                partition,
                snapshot,
            });
        }

        let memory = ContinuityStore::from_entries(config, entries)?;
        tracing::debug!(nodes = memory.len(), "loaded liquidity memory");
        Ok(memory)
    }

    /// Per-partition row counts, read without deserializing node records.
    pub fn partition_counts(&self) -> Result<PartitionCounts> {
        let mut stmt = self
            .conn
            .prepare("SELECT partition, count(*) FROM nodes GROUP BY partition")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut counts = PartitionCounts::default();
        for (name, n) in rows {
            let n = usize::try_from(n).unwrap_or(0);
            match Partition::parse(&name) {
                Some(Partition::Active) => counts.active = n,
                Some(Partition::Dormant) => counts.dormant = n,
                Some(Partition::Archived) => counts.archived = n,
                None => {
                    return Err(StoreError::InvalidData(format!(
                        "unknown partition '{name}'"
                    )));
                }
            }
        }
        Ok(counts)
    }

    pub fn last_saved(&self) -> Result<Option<String>> {
        self.get_metadata(SAVED_AT_KEY)
    }

    /// Database size in bytes (page_count * page_size).
    pub fn db_size(&self) -> Result<u64> {
        let page_count: i64 = self
            .conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = self
            .conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok(u64::try_from(page_count * page_size).unwrap_or(0))
    }
}
