//! Persistent tag cache.
//!
//! Extracted tags are keyed by absolute path and invalidated by mtime, so
//! repeated map builds only re-parse files that changed. The on-disk store
//! is SQLite under a versioned directory at the repo root. Any store
//! failure degrades the cache rather than failing the map: first by
//! recreating the database, then by falling back to a process-local
//! memory store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use carto_core::{CartoError, OutputSink, Result, Severity};
use rusqlite::Connection;

use crate::tags::Tag;

/// Bumped when the cache schema or tag format changes. Old cache
/// directories are simply abandoned on disk.
pub const CACHE_VERSION: u32 = 1;

/// Directory name holding the tag database, relative to the repo root.
///
/// # Examples
///
/// ```
/// assert_eq!(carto_map::cache::cache_dir_name(), ".carto.tags.cache.v1");
/// ```
pub fn cache_dir_name() -> String {
    format!(".carto.tags.cache.v{CACHE_VERSION}")
}

/// Path of the tag database for a repo root.
pub fn cache_db_path(root: &Path) -> PathBuf {
    root.join(cache_dir_name()).join("tags.db")
}

/// A cached extraction result for one file.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub mtime_secs: i64,
    pub mtime_nanos: u32,
    pub tags: Vec<Tag>,
}

/// Storage backend for cached tags.
pub trait TagStore: Send {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    fn put(&mut self, key: &str, entry: &CacheEntry) -> Result<()>;
    fn count(&self) -> Result<usize>;
    fn clear(&mut self) -> Result<()>;
}

/// In-process store used when persistence is disabled or unavailable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, CacheEntry>,
}

impl TagStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, entry: &CacheEntry) -> Result<()> {
        self.entries.insert(key.to_string(), entry.clone());
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.entries.len())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`CartoError::Cache`] if the database cannot be opened or
    /// the schema cannot be created.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CartoError::Cache(format!("create cache dir: {e}")))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| CartoError::Cache(format!("open cache db: {e}")))?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database, for tests.
    ///
    /// # Errors
    ///
    /// Returns [`CartoError::Cache`] if the database cannot be opened.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CartoError::Cache(format!("open cache db: {e}")))?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tags (
            path        TEXT PRIMARY KEY,
            mtime_secs  INTEGER NOT NULL,
            mtime_nanos INTEGER NOT NULL,
            tags        TEXT NOT NULL,
            indexed_at  TEXT NOT NULL
        );",
    )
    .map_err(|e| CartoError::Cache(format!("init cache schema: {e}")))
}

impl TagStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT mtime_secs, mtime_nanos, tags FROM tags WHERE path = ?1")
            .map_err(|e| CartoError::Cache(e.to_string()))?;
        let row = stmt.query_row([key], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        });
        match row {
            Ok((mtime_secs, mtime_nanos, json)) => {
                let tags = serde_json::from_str(&json)?;
                Ok(Some(CacheEntry {
                    mtime_secs,
                    mtime_nanos: mtime_nanos as u32,
                    tags,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(CartoError::Cache(e.to_string())),
        }
    }

    fn put(&mut self, key: &str, entry: &CacheEntry) -> Result<()> {
        let json = serde_json::to_string(&entry.tags)?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO tags (path, mtime_secs, mtime_nanos, tags, indexed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    key,
                    entry.mtime_secs,
                    entry.mtime_nanos as i64,
                    json,
                    chrono::Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| CartoError::Cache(e.to_string()))?;
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))
            .map_err(|e| CartoError::Cache(e.to_string()))?;
        Ok(n as usize)
    }

    fn clear(&mut self) -> Result<()> {
        self.conn
            .execute("DELETE FROM tags", [])
            .map_err(|e| CartoError::Cache(e.to_string()))?;
        Ok(())
    }
}

/// The tag cache used by map builds.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use std::sync::Arc;
/// use carto_map::cache::TagCache;
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
///
/// let mut cache = TagCache::open(dir.path(), false, Arc::new(carto_core::SilentSink));
/// let tags = cache.get_tags(&dir.path().join("a.rs"), Path::new("a.rs"), false, |_, _| {
///     Vec::new()
/// });
/// assert!(tags.is_empty());
/// ```
pub struct TagCache {
    store: Box<dyn TagStore>,
    root: PathBuf,
    on_disk: bool,
    sink: Arc<dyn OutputSink>,
}

impl TagCache {
    /// Open the cache for a repo root. With `persistent` set, tags go to
    /// SQLite under [`cache_dir_name`]; otherwise to memory. Never fails:
    /// an unusable database degrades to the memory store with a warning.
    pub fn open(root: &Path, persistent: bool, sink: Arc<dyn OutputSink>) -> Self {
        let (store, on_disk): (Box<dyn TagStore>, bool) = if persistent {
            match SqliteStore::open(&cache_db_path(root)) {
                Ok(store) => (Box::new(store), true),
                Err(_) => {
                    sink.emit(
                        Severity::Warning,
                        &format!(
                            "Unable to use tags cache at {}, falling back to memory cache",
                            root.join(cache_dir_name()).display()
                        ),
                    );
                    (Box::new(MemoryStore::default()), false)
                }
            }
        } else {
            (Box::new(MemoryStore::default()), false)
        };

        Self {
            store,
            root: root.to_path_buf(),
            on_disk,
            sink,
        }
    }

    /// Fetch tags for a file, invoking `extract` only on cache miss or
    /// mtime change. With `force_refresh` the cached entry is ignored and
    /// always rewritten. Files that cannot be stat'd produce no tags.
    pub fn get_tags<F>(
        &mut self,
        path: &Path,
        rel_path: &Path,
        force_refresh: bool,
        extract: F,
    ) -> Vec<Tag>
    where
        F: FnOnce(&Path, &Path) -> Vec<Tag>,
    {
        let Some((mtime_secs, mtime_nanos)) = file_mtime(path) else {
            self.sink.emit(
                Severity::Warning,
                &format!("File not found: {}", path.display()),
            );
            return Vec::new();
        };
        let key = path.to_string_lossy().into_owned();

        if !force_refresh {
            let cached = match self.store.get(&key) {
                Ok(entry) => entry,
                Err(_) => {
                    self.recover_store();
                    self.store.get(&key).unwrap_or_default()
                }
            };
            if let Some(entry) = cached {
                if entry.mtime_secs == mtime_secs && entry.mtime_nanos == mtime_nanos {
                    return entry.tags;
                }
            }
        }

        let tags = extract(path, rel_path);
        let entry = CacheEntry {
            mtime_secs,
            mtime_nanos,
            tags: tags.clone(),
        };
        if self.store.put(&key, &entry).is_err() {
            self.recover_store();
            let _ = self.store.put(&key, &entry);
        }
        tags
    }

    /// Number of cached entries, zero if the store cannot report.
    pub fn entry_count(&self) -> usize {
        self.store.count().unwrap_or(0)
    }

    /// Whether tags are being written to disk.
    pub fn is_persistent(&self) -> bool {
        self.on_disk
    }

    /// Replace a failing disk store: recreate the database, and if that
    /// fails too, fall back to memory with a warning.
    fn recover_store(&mut self) {
        if !self.on_disk {
            return;
        }
        let dir = self.root.join(cache_dir_name());
        let _ = std::fs::remove_dir_all(&dir);
        match SqliteStore::open(&cache_db_path(&self.root)) {
            Ok(store) => {
                self.store = Box::new(store);
            }
            Err(_) => {
                self.sink.emit(
                    Severity::Warning,
                    &format!(
                        "Unable to use tags cache at {}, falling back to memory cache",
                        dir.display()
                    ),
                );
                self.store = Box::new(MemoryStore::default());
                self.on_disk = false;
            }
        }
    }
}

fn file_mtime(path: &Path) -> Option<(i64, u32)> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let dur = modified.duration_since(std::time::UNIX_EPOCH).ok()?;
    Some((dur.as_secs() as i64, dur.subsec_nanos()))
}
