//! Slot backends for the record store.
//!
//! A slot is one serialized record addressed by `(namespace, key)`. The
//! store never interprets anything below that: the backends only move bytes.
//!
//! The SQLite schema is intentionally simple:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS slots (
//!     namespace  TEXT NOT NULL,
//!     key        TEXT NOT NULL,
//!     data       BLOB NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     checksum   TEXT,
//!     PRIMARY KEY (namespace, key)
//! );
//! ```
//!
//! - WAL mode for concurrent reads while a turn is writing
//! - JSON inside a BLOB column keeps the schema stable across record changes
//! - Optional CRC-32 checksum flags torn writes
//! - Backup support via SQLite's online-backup API

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::error::Result;

/// Byte-level storage of individually addressable slots.
pub trait SlotBackend: Send + Sync {
    /// Read a slot, `None` if it was never written.
    ///
    /// # Errors
    /// Backend-specific I/O or database failures.
    fn read(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Overwrite a slot with `data`.
    ///
    /// # Errors
    /// Backend-specific I/O or database failures.
    fn write(&self, namespace: &str, key: &str, data: &[u8]) -> Result<()>;

    /// Every `(key, data)` pair in a namespace.
    ///
    /// # Errors
    /// Backend-specific I/O or database failures.
    fn list(&self, namespace: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Delete a slot. Returns `true` if it existed.
    ///
    /// # Errors
    /// Backend-specific I/O or database failures.
    fn remove(&self, namespace: &str, key: &str) -> Result<bool>;

    /// Move a slot into `backup_namespace` under a fresh, timestamped key.
    ///
    /// Returns the backup key, or `None` if the slot did not exist. The
    /// bytes are copied before the original is removed.
    ///
    /// # Errors
    /// Backend-specific I/O or database failures.
    fn quarantine(
        &self,
        namespace: &str,
        key: &str,
        backup_namespace: &str,
    ) -> Result<Option<String>> {
        let Some(data) = self.read(namespace, key)? else {
            return Ok(None);
        };
        let backup_key = backup_key(key);
        self.write(backup_namespace, &backup_key, &data)?;
        self.remove(namespace, key)?;
        Ok(Some(backup_key))
    }
}

/// Key under which a quarantined slot is kept, e.g. `42.corrupt.1729252800000`.
fn backup_key(key: &str) -> String {
    format!("{key}.corrupt.{}", Utc::now().timestamp_millis())
}

// ---------------------------------------------------------------------------
// CRC-32 checksum helper
// ---------------------------------------------------------------------------

/// Compute a CRC-32 checksum of `data` and return it as a lowercase hex string.
fn crc32_hex(data: &[u8]) -> String {
    format!("{:08x}", crc32_compute(data))
}

/// Basic CRC-32 (ISO 3309 / ITU-T V.42) computation.
fn crc32_compute(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

// ---------------------------------------------------------------------------
// SqliteSlots
// ---------------------------------------------------------------------------

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS slots (
    namespace  TEXT NOT NULL,
    key        TEXT NOT NULL,
    data       BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    checksum   TEXT,
    PRIMARY KEY (namespace, key)
);";

/// Slot backend on a single SQLite database.
///
/// # Usage
///
/// ```no_run
/// # use confidant_core::persistence::{SlotBackend, SqliteSlots};
/// # use confidant_core::config::PersistenceConfig;
/// let slots = SqliteSlots::open("confidant.db", &PersistenceConfig::default())?;
/// slots.write("user", "42", br#"{"id":42}"#)?;
/// assert!(slots.read("user", "42")?.is_some());
/// # Ok::<(), confidant_core::error::ConfidantError>(())
/// ```
pub struct SqliteSlots {
    conn: Mutex<Connection>,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteSlots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSlots")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqliteSlots {
    /// Open (or create) an SQLite database at `path`.
    ///
    /// The schema is created if it does not exist. WAL mode is enabled when
    /// `config.wal_mode` is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfidantError::Database`](crate::ConfidantError::Database) on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "Slot store opened"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            config: config.clone(),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`ConfidantError::Database`](crate::ConfidantError::Database) on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Number of slots in a namespace.
    ///
    /// # Errors
    ///
    /// Returns [`ConfidantError::Database`](crate::ConfidantError::Database) on SQLite failures.
    pub fn count(&self, namespace: &str) -> Result<usize> {
        let count: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM slots WHERE namespace = ?1",
            params![namespace],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Backup
    // ------------------------------------------------------------------

    /// Copy the whole database to `dest_path` using SQLite's online-backup API.
    ///
    /// # Errors
    ///
    /// Returns [`ConfidantError::Database`](crate::ConfidantError::Database) on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let conn = self.conn.lock();
        let backup = rusqlite::backup::Backup::new(&*conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;

        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Database backup completed"
        );
        Ok(())
    }

    /// Create a numbered backup next to the database file, rotating old
    /// backups so that at most `config.backup_count` are kept.
    ///
    /// # Errors
    ///
    /// Returns [`ConfidantError::Database`](crate::ConfidantError::Database) or
    /// [`ConfidantError::Io`](crate::ConfidantError::Io) on failure.
    pub fn create_rotating_backup(&self) -> Result<()> {
        if self.db_path.as_os_str() == ":memory:" {
            return Ok(());
        }

        let max = self.config.backup_count;
        if max == 0 {
            return Ok(());
        }

        for i in (1..max).rev() {
            let src = self.backup_path(i);
            if src.exists() {
                std::fs::rename(&src, self.backup_path(i + 1))?;
            }
        }

        let oldest = self.backup_path(max + 1);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }

        self.backup(self.backup_path(1))?;
        info!(max_backups = max, "Rotating backup created");
        Ok(())
    }

    /// Path to a numbered backup file (e.g. `confidant.db.bak.1`).
    fn backup_path(&self, n: u32) -> PathBuf {
        let mut p = self.db_path.clone();
        let ext = format!(
            "{}.bak.{n}",
            p.extension()
                .map_or(String::new(), |e| e.to_string_lossy().into_owned())
        );
        p.set_extension(ext);
        p
    }

    /// Return the path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `PRAGMA integrity_check`; `Ok(true)` when the database is sound.
    ///
    /// # Errors
    ///
    /// Returns [`ConfidantError::Database`](crate::ConfidantError::Database) if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .lock()
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    fn verify_checksum(&self, namespace: &str, key: &str, data: &[u8], stored: Option<&str>) {
        if !self.config.checksum_enabled {
            return;
        }
        if let Some(expected) = stored {
            let actual = crc32_hex(data);
            if expected != actual {
                warn!(
                    namespace,
                    key,
                    expected = %expected,
                    actual = %actual,
                    "Checksum mismatch: possible torn write"
                );
            }
        }
    }
}

impl SlotBackend for SqliteSlots {
    fn read(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached(
                "SELECT data, checksum FROM slots WHERE namespace = ?1 AND key = ?2",
            )?;
        let row: Option<(Vec<u8>, Option<String>)> = stmt
            .query_row(params![namespace, key], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        Ok(row.map(|(data, checksum)| {
            self.verify_checksum(namespace, key, &data, checksum.as_deref());
            data
        }))
    }

    fn write(&self, namespace: &str, key: &str, data: &[u8]) -> Result<()> {
        let start = Instant::now();
        let checksum = self.config.checksum_enabled.then(|| crc32_hex(data));
        let now = Utc::now().to_rfc3339();

        self.conn.lock().execute(
            "INSERT INTO slots (namespace, key, data, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(namespace, key) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![namespace, key, data, now, checksum],
        )?;

        debug!(
            namespace,
            key,
            bytes = data.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Wrote slot"
        );
        Ok(())
    }

    fn list(&self, namespace: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT key, data, checksum FROM slots WHERE namespace = ?1")?;
        let rows = stmt.query_map(params![namespace], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut slots = Vec::new();
        for row in rows {
            let (key, data, checksum) = row?;
            self.verify_checksum(namespace, &key, &data, checksum.as_deref());
            slots.push((key, data));
        }
        Ok(slots)
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<bool> {
        let deleted = self.conn.lock().execute(
            "DELETE FROM slots WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
        )?;
        Ok(deleted > 0)
    }

    fn quarantine(
        &self,
        namespace: &str,
        key: &str,
        backup_namespace: &str,
    ) -> Result<Option<String>> {
        let backup_key = backup_key(key);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let copied = tx.execute(
            "INSERT INTO slots (namespace, key, data, updated_at, checksum)
             SELECT ?3, ?4, data, updated_at, checksum FROM slots
             WHERE namespace = ?1 AND key = ?2",
            params![namespace, key, backup_namespace, backup_key],
        )?;
        if copied == 0 {
            return Ok(None);
        }
        tx.execute(
            "DELETE FROM slots WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
        )?;
        tx.commit()?;
        Ok(Some(backup_key))
    }
}

// ---------------------------------------------------------------------------
// MemorySlots
// ---------------------------------------------------------------------------

/// Process-local slot backend. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySlots {
    slots: Mutex<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemorySlots {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotBackend for MemorySlots {
    fn read(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .slots
            .lock()
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    fn write(&self, namespace: &str, key: &str, data: &[u8]) -> Result<()> {
        self.slots
            .lock()
            .insert((namespace.to_string(), key.to_string()), data.to_vec());
        Ok(())
    }

    fn list(&self, namespace: &str) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self
            .slots
            .lock()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|((_, key), data)| (key.clone(), data.clone()))
            .collect())
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<bool> {
        Ok(self
            .slots
            .lock()
            .remove(&(namespace.to_string(), key.to_string()))
            .is_some())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
