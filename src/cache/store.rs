//! Key → sequence stores backing the result libraries.
//!
//! Purpose
//! -------
//! Persist gradient/curl sequences under string keys. [`SqliteStore`] is the
//! on-disk store shared by every process working on a cache directory;
//! [`MemoryStore`] keeps entries in process memory.
//!
//! Conventions
//! -----------
//! - Values are stored as little-endian `f64` bytes.
//! - A blob whose length is not a multiple of 8 (a partial write) reads as a
//!   miss, so the caller recomputes.
use crate::cache::errors::CacheResult;
use ndarray::Array1;
use rusqlite::{Connection, OptionalExtension, params};
use std::{collections::HashMap, path::Path};
use tracing::warn;

/// File name of the SQLite store inside a cache directory.
pub const STORE_FILE: &str = "npdb.db";

/// Persistent key → sequence map.
pub trait ResultStore: Send {
    fn get(&self, key: &str) -> CacheResult<Option<Array1<f64>>>;

    /// Insert or replace `key`.
    fn put(&mut self, key: &str, value: &Array1<f64>) -> CacheResult<()>;

    /// Delete `key`; absent keys are ignored.
    fn remove(&mut self, key: &str) -> CacheResult<()>;
}

fn encode(value: &Array1<f64>) -> Vec<u8> {
    value.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode(blob: &[u8]) -> Option<Array1<f64>> {
    if blob.len() % 8 != 0 {
        return None;
    }
    let values = blob
        .chunks_exact(8)
        .map(|c| {
            let mut b = [0u8; 8];
            b.copy_from_slice(c);
            f64::from_le_bytes(b)
        })
        .collect();
    Some(Array1::from_vec(values))
}

/// SQLite table `npdb(key TEXT PRIMARY KEY, arr BLOB)`.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the store file at `path`.
    pub fn open(path: &Path) -> CacheResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute("CREATE TABLE IF NOT EXISTS npdb (key TEXT PRIMARY KEY, arr BLOB)", [])?;
        Ok(Self { conn })
    }

    /// Open `npdb.db` inside `dir`.
    pub fn in_dir(dir: &Path) -> CacheResult<Self> {
        Self::open(&dir.join(STORE_FILE))
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.conn.path()).finish()
    }
}

impl ResultStore for SqliteStore {
    fn get(&self, key: &str) -> CacheResult<Option<Array1<f64>>> {
        let blob: Option<Vec<u8>> = self
            .conn
            .query_row("SELECT arr FROM npdb WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(blob.and_then(|b| {
            let decoded = decode(&b);
            if decoded.is_none() {
                warn!(key, bytes = b.len(), "partial entry in result store, treating as miss");
            }
            decoded
        }))
    }

    fn put(&mut self, key: &str, value: &Array1<f64>) -> CacheResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO npdb (key, arr) VALUES (?1, ?2)",
            params![key, encode(value)],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> CacheResult<()> {
        self.conn.execute("DELETE FROM npdb WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// In-process store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Array1<f64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResultStore for MemoryStore {
    fn get(&self, key: &str) -> CacheResult<Option<Array1<f64>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &Array1<f64>) -> CacheResult<()> {
        self.entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}
