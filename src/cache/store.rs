//! Persistent per-tenant cache store
//!
//! One store root owns a SQLite index (metadata, artifact, and group-state
//! tables) and an artifact directory. The index runs in WAL mode with a
//! busy timeout so several processes can share a root; artifact files are
//! written to a temp file and renamed into place so a reader never sees a
//! partial write. Metadata expires lazily on read; sweeps purge stale rows
//! and idle artifacts, and every artifact write re-checks the byte cap.

use crate::cache::key::{validate_within_root, CacheKey};
use crate::config::CacheConfig;
use crate::error::{GantryError, GantryResult};
use crate::signal::CancelSignal;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWriteExt, BufWriter};
use tracing::{debug, warn};
use uuid::Uuid;

const INDEX_FILE: &str = "index.db";
const ARTIFACT_DIR: &str = "artifacts";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Artifacts are sharded by the leading characters of their group id
const SHARD_CHARS: usize = 8;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    group_id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS artifacts (
    key TEXT PRIMARY KEY,
    rel_path TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    group_id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    last_accessed INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS group_state (
    group_id TEXT PRIMARY KEY,
    finished INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_metadata_expires ON metadata(expires_at);
CREATE INDEX IF NOT EXISTS idx_artifacts_last_accessed ON artifacts(last_accessed);
"#;

/// Aggregate store statistics
#[derive(Debug, Clone)]
pub struct StoreStatus {
    pub total_artifact_bytes: u64,
    pub metadata_count: u64,
    pub artifact_count: u64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
    pub max_bytes: u64,
}

/// Outcome of a best-effort cleanup pass
///
/// Cache content is regenerable, so per-item failures never abort the
/// batch; they are collected here for diagnostics instead.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub rows_removed: u64,
    pub artifacts_removed: u64,
    pub bytes_freed: u64,
    pub failures: Vec<String>,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.rows_removed == 0 && self.artifacts_removed == 0 && self.failures.is_empty()
    }
}

/// Durable cache store for one tenant
pub struct CacheStore {
    root: PathBuf,
    artifact_dir: PathBuf,
    index: Mutex<Connection>,
    max_total_bytes: u64,
    artifact_max_age: Duration,
}

impl CacheStore {
    /// Open (creating if needed) the store at `root`
    ///
    /// Runs a best-effort expiry sweep so stale rows from earlier runs do
    /// not accumulate.
    pub fn open(root: &Path, config: &CacheConfig) -> GantryResult<Self> {
        std::fs::create_dir_all(root)
            .map_err(|e| GantryError::io(format!("creating store root {}", root.display()), e))?;

        let artifact_dir = root.join(ARTIFACT_DIR);
        std::fs::create_dir_all(&artifact_dir).map_err(|e| {
            GantryError::io(
                format!("creating artifact dir {}", artifact_dir.display()),
                e,
            )
        })?;
        let artifact_dir = artifact_dir.canonicalize().map_err(|e| {
            GantryError::io(
                format!("resolving artifact dir {}", artifact_dir.display()),
                e,
            )
        })?;

        let index_path = root.join(INDEX_FILE);
        let conn = Connection::open(&index_path)
            .map_err(|e| GantryError::index(format!("opening {}", index_path.display()), e))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| GantryError::index("enabling WAL journal", e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| GantryError::index("setting busy timeout", e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| GantryError::index("initializing schema", e))?;

        let store = Self {
            root: root.to_path_buf(),
            artifact_dir,
            index: Mutex::new(conn),
            max_total_bytes: config.max_total_bytes(),
            artifact_max_age: config.artifact_max_age(),
        };

        match store.evict_expired() {
            Ok(report) if !report.is_empty() => {
                debug!(
                    "Expiry sweep on open: {} rows, {} artifacts removed",
                    report.rows_removed, report.artifacts_removed
                );
            }
            Err(e) => warn!("Expiry sweep on open failed: {}", e),
            _ => {}
        }

        Ok(store)
    }

    /// The directory this store lives in
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index(&self) -> MutexGuard<'_, Connection> {
        self.index.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ---- metadata ----

    /// Look up a metadata value
    ///
    /// Missing and expired rows are both a miss, never an error. Expired
    /// rows are left in place for the next sweep.
    pub fn get_metadata(
        &self,
        key: &CacheKey,
        signal: &CancelSignal,
    ) -> GantryResult<Option<String>> {
        if signal.is_cancelled() {
            return Err(GantryError::Cancelled);
        }

        let now = now_millis();
        let row: Option<(String, i64)> = self
            .index()
            .query_row(
                "SELECT value, expires_at FROM metadata WHERE key = ?1",
                params![key.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| GantryError::index("reading metadata row", e))?;

        Ok(row.and_then(|(value, expires_at)| {
            if now < expires_at {
                debug!("Metadata cache hit for {}", key);
                Some(value)
            } else {
                debug!("Metadata cache entry for {} expired", key);
                None
            }
        }))
    }

    /// Insert or overwrite a metadata value with the given TTL
    pub fn set_metadata(
        &self,
        key: &CacheKey,
        value: &str,
        ttl: Duration,
        signal: &CancelSignal,
    ) -> GantryResult<()> {
        if signal.is_cancelled() {
            return Err(GantryError::Cancelled);
        }

        let now = now_millis();
        let expires_at = now + ttl.as_millis() as i64;
        self.index()
            .execute(
                "INSERT INTO metadata (key, value, group_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     group_id = excluded.group_id,
                     created_at = excluded.created_at,
                     expires_at = excluded.expires_at",
                params![key.as_str(), value, key.group_id(), now, expires_at],
            )
            .map_err(|e| GantryError::index("writing metadata row", e))?;
        Ok(())
    }

    // ---- group state ----

    /// Cached "is this group finished" fact, if known and fresh
    pub fn group_state(
        &self,
        group_id: &str,
        signal: &CancelSignal,
    ) -> GantryResult<Option<bool>> {
        if signal.is_cancelled() {
            return Err(GantryError::Cancelled);
        }

        let now = now_millis();
        let row: Option<(bool, i64)> = self
            .index()
            .query_row(
                "SELECT finished, expires_at FROM group_state WHERE group_id = ?1",
                params![group_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| GantryError::index("reading group state", e))?;

        Ok(row.and_then(|(finished, expires_at)| (now < expires_at).then_some(finished)))
    }

    /// Record the "is this group finished" fact with its own TTL
    pub fn set_group_state(
        &self,
        group_id: &str,
        finished: bool,
        ttl: Duration,
        signal: &CancelSignal,
    ) -> GantryResult<()> {
        if signal.is_cancelled() {
            return Err(GantryError::Cancelled);
        }

        let now = now_millis();
        let expires_at = now + ttl.as_millis() as i64;
        self.index()
            .execute(
                "INSERT INTO group_state (group_id, finished, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(group_id) DO UPDATE SET
                     finished = excluded.finished,
                     created_at = excluded.created_at,
                     expires_at = excluded.expires_at",
                params![group_id, finished, now, expires_at],
            )
            .map_err(|e| GantryError::index("writing group state", e))?;
        Ok(())
    }

    // ---- artifacts ----

    fn artifact_path(&self, key: &CacheKey) -> GantryResult<PathBuf> {
        let shard: String = key.group_id().chars().take(SHARD_CHARS).collect();
        let path = self.artifact_dir.join(shard).join(key.file_name());
        validate_within_root(&path, &self.artifact_dir)?;
        Ok(path)
    }

    /// Resolve a stored relative path, re-validating containment
    ///
    /// The index is an untrusted cache of a filesystem fact, so the check
    /// runs on every read, not just at write time.
    fn resolve_rel_path(&self, rel: &str) -> GantryResult<PathBuf> {
        let path = self.artifact_dir.join(rel);
        validate_within_root(&path, &self.artifact_dir)?;
        Ok(path)
    }

    /// Open a cached artifact for reading
    ///
    /// A hit bumps `last_accessed`. A row whose backing file has vanished
    /// (external cleanup, tampering) is treated as a miss and the stale
    /// row is dropped.
    pub async fn get_artifact(
        &self,
        key: &CacheKey,
        signal: &CancelSignal,
    ) -> GantryResult<Option<File>> {
        if signal.is_cancelled() {
            return Err(GantryError::Cancelled);
        }

        let rel: Option<String> = {
            self.index()
                .query_row(
                    "SELECT rel_path FROM artifacts WHERE key = ?1",
                    params![key.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| GantryError::index("reading artifact row", e))?
        };
        let Some(rel) = rel else {
            return Ok(None);
        };

        let path = self.resolve_rel_path(&rel)?;
        match File::open(&path).await {
            Ok(file) => {
                debug!("Artifact cache hit for {}", key);
                self.index()
                    .execute(
                        "UPDATE artifacts SET last_accessed = ?1 WHERE key = ?2",
                        params![now_millis(), key.as_str()],
                    )
                    .map_err(|e| GantryError::index("updating artifact access time", e))?;
                Ok(Some(file))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Artifact row for {} has no backing file, dropping", key);
                if let Err(e) = self
                    .index()
                    .execute("DELETE FROM artifacts WHERE key = ?1", params![key.as_str()])
                {
                    warn!("Failed to drop stale artifact row {}: {}", key, e);
                }
                Ok(None)
            }
            Err(e) => Err(GantryError::io(
                format!("opening artifact {}", path.display()),
                e,
            )),
        }
    }

    /// Stream an artifact into the cache
    ///
    /// Content goes to a temp file in the destination directory and is
    /// renamed into place once fully written and synced. Writes are the
    /// only path that grows the store, so the LRU cap check runs here.
    /// Returns a read handle to the stored copy along with its size; the
    /// handle is opened before the cap check, so a caller who just
    /// fetched an artifact larger than the whole cap is still served
    /// even though the entry is demoted again immediately.
    pub async fn set_artifact<R>(
        &self,
        key: &CacheKey,
        reader: &mut R,
        signal: &CancelSignal,
    ) -> GantryResult<(File, u64)>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        if signal.is_cancelled() {
            return Err(GantryError::Cancelled);
        }

        let final_path = self.artifact_path(key)?;
        let dir = final_path
            .parent()
            .ok_or_else(|| GantryError::Internal(format!("artifact path {} has no parent", final_path.display())))?;
        fs::create_dir_all(dir)
            .await
            .map_err(|e| GantryError::io(format!("creating artifact dir {}", dir.display()), e))?;

        let temp_path = final_path.with_extension(format!("tmp.{}", Uuid::new_v4()));
        let file = File::create(&temp_path).await.map_err(|e| {
            GantryError::io(format!("creating temp file {}", temp_path.display()), e)
        })?;
        let mut writer = BufWriter::new(file);

        let write_result = async {
            tokio::io::copy(reader, &mut writer)
                .await
                .map_err(|e| GantryError::io("writing artifact content", e))?;
            writer
                .flush()
                .await
                .map_err(|e| GantryError::io("flushing artifact content", e))?;
            writer
                .get_mut()
                .sync_all()
                .await
                .map_err(|e| GantryError::io("syncing artifact to disk", e))?;
            Ok::<(), GantryError>(())
        }
        .await;

        if let Err(e) = write_result {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        fs::rename(&temp_path, &final_path).await.map_err(|e| {
            GantryError::io(format!("renaming artifact into {}", final_path.display()), e)
        })?;

        let stored = File::open(&final_path).await.map_err(|e| {
            GantryError::io(format!("reopening artifact {}", final_path.display()), e)
        })?;
        let size = stored
            .metadata()
            .await
            .map_err(|e| GantryError::io("reading artifact size", e))?
            .len();

        let rel = final_path
            .strip_prefix(&self.artifact_dir)
            .map_err(|_| GantryError::Internal("artifact path left its root".to_string()))?
            .to_string_lossy()
            .into_owned();

        let now = now_millis();
        self.index()
            .execute(
                "INSERT INTO artifacts (key, rel_path, size_bytes, group_id, created_at, last_accessed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(key) DO UPDATE SET
                     rel_path = excluded.rel_path,
                     size_bytes = excluded.size_bytes,
                     group_id = excluded.group_id,
                     created_at = excluded.created_at,
                     last_accessed = excluded.last_accessed",
                params![key.as_str(), rel, size as i64, key.group_id(), now, now],
            )
            .map_err(|e| GantryError::index("writing artifact row", e))?;

        debug!("Stored artifact {} ({} bytes)", key, size);

        let report = self.evict_lru_if_over_cap()?;
        if !report.is_empty() {
            debug!(
                "LRU eviction after write: {} artifacts, {} bytes freed",
                report.artifacts_removed, report.bytes_freed
            );
        }

        Ok((stored, size))
    }

    // ---- maintenance ----

    /// Aggregate statistics for status output
    pub fn status(&self) -> GantryResult<StoreStatus> {
        let conn = self.index();

        let (artifact_count, total_artifact_bytes): (u64, u64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM artifacts",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)? as u64,
                        row.get::<_, i64>(1)? as u64,
                    ))
                },
            )
            .map_err(|e| GantryError::index("counting artifacts", e))?;

        let metadata_count: u64 = conn
            .query_row("SELECT COUNT(*) FROM metadata", [], |row| {
                Ok(row.get::<_, i64>(0)? as u64)
            })
            .map_err(|e| GantryError::index("counting metadata", e))?;

        let (oldest, newest): (Option<i64>, Option<i64>) = conn
            .query_row(
                "SELECT MIN(created_at), MAX(created_at) FROM (
                     SELECT created_at FROM metadata
                     UNION ALL
                     SELECT created_at FROM artifacts
                 )",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| GantryError::index("reading entry age range", e))?;

        Ok(StoreStatus {
            total_artifact_bytes,
            metadata_count,
            artifact_count,
            oldest_entry: oldest.and_then(DateTime::from_timestamp_millis),
            newest_entry: newest.and_then(DateTime::from_timestamp_millis),
            max_bytes: self.max_total_bytes,
        })
    }

    /// Remove everything from the store
    ///
    /// Best-effort: cache content is regenerable, so individual failures
    /// are collected and the rest of the batch continues.
    pub fn clear(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        {
            let conn = self.index();
            for table in ["metadata", "artifacts", "group_state"] {
                match conn.execute(&format!("DELETE FROM {}", table), []) {
                    Ok(n) => report.rows_removed += n as u64,
                    Err(e) => report.failures.push(format!("clearing {}: {}", table, e)),
                }
            }
        }

        if let Err(e) = std::fs::remove_dir_all(&self.artifact_dir) {
            if e.kind() != ErrorKind::NotFound {
                report
                    .failures
                    .push(format!("removing artifact dir: {}", e));
            }
        }
        if let Err(e) = std::fs::create_dir_all(&self.artifact_dir) {
            report
                .failures
                .push(format!("recreating artifact dir: {}", e));
        }

        for failure in &report.failures {
            warn!("Cache clear: {}", failure);
        }
        report
    }

    /// Purge expired metadata/group-state rows and idle artifacts
    ///
    /// Artifacts are evicted by idle age (`last_accessed`), independent of
    /// the byte cap.
    pub fn evict_expired(&self) -> GantryResult<CleanupReport> {
        let mut report = CleanupReport::default();
        let now = now_millis();

        {
            let conn = self.index();
            for table in ["metadata", "group_state"] {
                match conn.execute(
                    &format!("DELETE FROM {} WHERE expires_at <= ?1", table),
                    params![now],
                ) {
                    Ok(n) => report.rows_removed += n as u64,
                    Err(e) => report
                        .failures
                        .push(format!("purging expired {}: {}", table, e)),
                }
            }
        }

        let cutoff = now - self.artifact_max_age.as_millis() as i64;
        let stale = self.artifact_rows("WHERE last_accessed < ?1", params![cutoff])?;
        for (key, rel, size) in stale {
            self.remove_artifact_entry(&mut report, &key, &rel, size);
        }

        for failure in &report.failures {
            warn!("Expiry sweep: {}", failure);
        }
        Ok(report)
    }

    /// Enforce the artifact byte cap, oldest access first
    pub fn evict_lru_if_over_cap(&self) -> GantryResult<CleanupReport> {
        let mut report = CleanupReport::default();
        if self.max_total_bytes == 0 {
            return Ok(report);
        }

        let mut total = self
            .status()?
            .total_artifact_bytes;
        if total <= self.max_total_bytes {
            return Ok(report);
        }

        let rows = self.artifact_rows("ORDER BY last_accessed ASC, key ASC", params![])?;
        for (key, rel, size) in rows {
            if total <= self.max_total_bytes {
                break;
            }
            self.remove_artifact_entry(&mut report, &key, &rel, size);
            total = total.saturating_sub(size);
        }

        for failure in &report.failures {
            warn!("LRU eviction: {}", failure);
        }
        Ok(report)
    }

    fn artifact_rows(
        &self,
        clause: &str,
        args: impl rusqlite::Params,
    ) -> GantryResult<Vec<(String, String, u64)>> {
        let conn = self.index();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT key, rel_path, size_bytes FROM artifacts {}",
                clause
            ))
            .map_err(|e| GantryError::index("preparing artifact scan", e))?;
        let rows = stmt
            .query_map(args, |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get::<_, i64>(2)? as u64,
                ))
            })
            .map_err(|e| GantryError::index("scanning artifacts", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| GantryError::index("reading artifact rows", e))?;
        Ok(rows)
    }

    /// Delete one artifact's file and row, recording failures
    ///
    /// The row goes away even when the file cannot be resolved or
    /// removed; the content is regenerable and a dangling row would keep
    /// resurfacing in every sweep.
    fn remove_artifact_entry(
        &self,
        report: &mut CleanupReport,
        key: &str,
        rel: &str,
        size: u64,
    ) {
        match self.resolve_rel_path(rel) {
            Ok(path) => {
                if let Err(e) = std::fs::remove_file(&path) {
                    if e.kind() != ErrorKind::NotFound {
                        report
                            .failures
                            .push(format!("removing {}: {}", path.display(), e));
                    }
                }
            }
            Err(e) => report.failures.push(format!("resolving {}: {}", rel, e)),
        }

        match self
            .index()
            .execute("DELETE FROM artifacts WHERE key = ?1", params![key])
        {
            Ok(_) => {
                report.artifacts_removed += 1;
                report.bytes_freed += size;
            }
            Err(e) => report
                .failures
                .push(format!("deleting artifact row {}: {}", key, e)),
        }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
