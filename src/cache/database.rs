//! SQLite-backed artifact store.

use crate::cache::entry::CacheEntry;
use crate::fingerprint::{Fingerprint, FINGERPRINT_LEN};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Database file inside the store directory.
pub const DATABASE_FILE: &str = "artifacts.db";

/// Lock file inside the store directory.
pub const LOCK_FILE: &str = "store.lock";

/// Current schema version, recorded in `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS artifacts (
    fingerprint   BLOB PRIMARY KEY NOT NULL,
    artifact_path TEXT NOT NULL,
    rendered_at   INTEGER NOT NULL
);
";

/// Errors raised by the artifact store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The store directory could not be created.
    #[error("Failed to create store directory {path}: {source}")]
    CreateDir {
        /// Store directory
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Another handle already holds the store lock.
    #[error("Store at {0} is locked by another mdv process")]
    Locked(PathBuf),

    /// The lock file could not be opened or locked.
    #[error("Failed to lock store {path}: {source}")]
    Lock {
        /// Lock file path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The database could not be opened.
    #[error("Failed to open store database {path}: {source}")]
    Open {
        /// Database file path
        path: PathBuf,
        /// The underlying SQLite error
        #[source]
        source: rusqlite::Error,
    },

    /// The schema could not be created or read.
    #[error("Failed to initialize store schema: {0}")]
    Schema(#[source] rusqlite::Error),

    /// The database was written by a newer, incompatible version.
    #[error("Unsupported store schema version {found} (expected {expected})")]
    UnsupportedSchema {
        /// Version found on disk
        found: i64,
        /// Version this build understands
        expected: i64,
    },

    /// A lookup query failed.
    #[error("Failed to read from store: {0}")]
    Read(#[source] rusqlite::Error),

    /// Persisting a mapping failed.
    #[error("Failed to write to store: {0}")]
    Write(#[source] rusqlite::Error),

    /// Artifact paths are stored as UTF-8 text.
    #[error("Artifact path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    /// Flushing and closing the database failed.
    #[error("Failed to close store: {0}")]
    Close(#[source] rusqlite::Error),
}

impl StoreError {
    /// Whether this error happened while opening the store.
    #[must_use]
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self,
            Self::CreateDir { .. }
                | Self::Locked(_)
                | Self::Lock { .. }
                | Self::Open { .. }
                | Self::Schema(_)
                | Self::UnsupportedSchema { .. }
        )
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent fingerprint -> artifact path store.
///
/// Holding an `ArtifactStore` means holding an exclusive lock on its
/// directory. The lock and the connection are released by [`close`], or by
/// `Drop` on any path that never reaches it.
///
/// [`close`]: ArtifactStore::close
pub struct ArtifactStore {
    // Field order matters: the connection is dropped before the lock.
    conn: Connection,
    lock: File,
    dir: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) the store in `dir`.
    ///
    /// # Arguments
    ///
    /// * `dir` - Store directory; created along with missing parents
    ///
    /// # Errors
    ///
    /// Fails immediately with [`StoreError::Locked`] if another handle holds
    /// the directory; it never waits for the lock. Returns
    /// [`StoreError::CreateDir`], [`StoreError::Open`] or
    /// [`StoreError::Schema`] when the directory or database is unusable, and
    /// [`StoreError::UnsupportedSchema`] for a database from a newer version.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mdv::cache::ArtifactStore;
    /// use std::path::Path;
    ///
    /// let store = ArtifactStore::open(Path::new("/tmp/mdv-store"))?;
    /// println!("{} cached artifacts", store.len()?);
    /// store.close()?;
    /// # Ok::<(), mdv::cache::StoreError>(())
    /// ```
    pub fn open(dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let lock = acquire_lock(dir)?;

        let db_path = dir.join(DATABASE_FILE);
        let conn = Connection::open(&db_path).map_err(|source| StoreError::Open {
            path: db_path.clone(),
            source,
        })?;
        init_schema(&conn)?;

        log::debug!("Opened artifact store at {}", dir.display());
        Ok(Self {
            conn,
            lock,
            dir: dir.to_path_buf(),
        })
    }

    /// Directory this store lives in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Look up the artifact path recorded for `fingerprint`.
    ///
    /// A missing key is `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the query fails.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> StoreResult<Option<PathBuf>> {
        self.conn
            .query_row(
                "SELECT artifact_path FROM artifacts WHERE fingerprint = ?1",
                params![&fingerprint.as_bytes()[..]],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map(|path| path.map(PathBuf::from))
            .map_err(StoreError::Read)
    }

    /// Full entry for `fingerprint`, including its write time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the query fails.
    pub fn entry(&self, fingerprint: &Fingerprint) -> StoreResult<Option<CacheEntry>> {
        self.conn
            .query_row(
                "SELECT fingerprint, artifact_path, rendered_at FROM artifacts WHERE fingerprint = ?1",
                params![&fingerprint.as_bytes()[..]],
                row_to_entry,
            )
            .optional()
            .map_err(StoreError::Read)
    }

    /// Record `artifact` as the rendering of `fingerprint`.
    ///
    /// Overwrites any previous mapping for the same fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NonUtf8Path`] if `artifact` is not valid UTF-8,
    /// and [`StoreError::Write`] if the insert fails. A failed put leaves any
    /// earlier mapping untouched.
    pub fn put(&self, fingerprint: &Fingerprint, artifact: &Path) -> StoreResult<()> {
        let path = artifact
            .to_str()
            .ok_or_else(|| StoreError::NonUtf8Path(artifact.to_path_buf()))?;

        self.conn
            .execute(
                "INSERT INTO artifacts (fingerprint, artifact_path, rendered_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(fingerprint) DO UPDATE SET
                    artifact_path = excluded.artifact_path,
                    rendered_at = excluded.rendered_at",
                params![
                    &fingerprint.as_bytes()[..],
                    path,
                    Utc::now().timestamp_millis()
                ],
            )
            .map_err(StoreError::Write)?;

        log::debug!("Stored {} -> {}", fingerprint, artifact.display());
        Ok(())
    }

    /// All entries, oldest write first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the query fails.
    pub fn entries(&self) -> StoreResult<Vec<CacheEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT fingerprint, artifact_path, rendered_at FROM artifacts
                 ORDER BY rendered_at, artifact_path",
            )
            .map_err(StoreError::Read)?;
        let entries = stmt
            .query_map([], row_to_entry)
            .map_err(StoreError::Read)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Read)?;
        Ok(entries)
    }

    /// Number of stored mappings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the query fails.
    pub fn len(&self) -> StoreResult<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM artifacts", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as usize)
            .map_err(StoreError::Read)
    }

    /// Whether the store holds no mappings.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Flush and close the database, then release the directory lock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Close`] if SQLite cannot close the connection.
    /// The lock is released either way.
    pub fn close(self) -> StoreResult<()> {
        let Self { conn, lock, dir } = self;

        let closed = conn.close().map_err(|(_, e)| StoreError::Close(e));
        if let Err(e) = FileExt::unlock(&lock) {
            log::warn!("Failed to release store lock in {}: {}", dir.display(), e);
        }
        drop(lock);

        log::debug!("Closed artifact store at {}", dir.display());
        closed
    }
}

fn acquire_lock(dir: &Path) -> StoreResult<File> {
    let lock_path = dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|source| StoreError::Lock {
            path: lock_path.clone(),
            source,
        })?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
            Err(StoreError::Locked(dir.to_path_buf()))
        }
        Err(source) => Err(StoreError::Lock {
            path: lock_path,
            source,
        }),
    }
}

fn init_schema(conn: &Connection) -> StoreResult<()> {
    let version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(StoreError::Schema)?;

    if version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema {
            found: version,
            expected: SCHEMA_VERSION,
        });
    }

    conn.execute_batch(SCHEMA).map_err(StoreError::Schema)?;
    if version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(StoreError::Schema)?;
    }
    Ok(())
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheEntry> {
    let key: Vec<u8> = row.get(0)?;
    let bytes: [u8; FINGERPRINT_LEN] = key.as_slice().try_into().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Blob,
            format!("fingerprint key has {} bytes", key.len()).into(),
        )
    })?;
    let path: String = row.get(1)?;
    let millis: i64 = row.get(2)?;

    Ok(CacheEntry {
        fingerprint: Fingerprint::from_bytes(bytes),
        artifact_path: PathBuf::from(path),
        rendered_at: DateTime::from_timestamp_millis(millis).unwrap_or_default(),
    })
}
