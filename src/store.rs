//! Persistent key-value catalog store.
//!
//! A single JSON object on disk, loaded once at startup.  Mutations update
//! the in-memory map and queue a write-behind of the whole map on tokio's
//! blocking pool (atomically, via a temporary file in the same directory),
//! so callers never wait on disk I/O.  The store is constructed explicitly
//! and handed to every component that needs it; there is no global
//! instance.
//!
//! # Key space
//!
//! | key                                   | value                    |
//! |---------------------------------------|--------------------------|
//! | `phpVersion`                          | detected PHP version     |
//! | `wpVersion:<dir>`                     | detected WP version      |
//! | `php-functions:<major.minor>`         | PHP catalog              |
//! | `wp-functions:<dir>:<major.minor>`    | WordPress catalog        |
//! | `customPhpPath`                       | user-confirmed PHP path  |
//! | `recentDirectories`                   | most-recent-first list   |

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::types::Catalog;

pub const PHP_VERSION_KEY: &str = "phpVersion";
pub const CUSTOM_PHP_PATH_KEY: &str = "customPhpPath";
pub const RECENT_DIRECTORIES_KEY: &str = "recentDirectories";

const WP_VERSION_PREFIX: &str = "wpVersion:";
const PHP_FUNCTIONS_PREFIX: &str = "php-functions:";
const WP_FUNCTIONS_PREFIX: &str = "wp-functions:";

/// Maximum length of the recent-directories list.
pub const MAX_RECENT_DIRECTORIES: usize = 5;

/// Key form of an installation path.  `/srv/wp/`, `/srv/wp` and
/// `/srv/./wp` all name the same directory.
pub fn directory_key(directory: &Path) -> String {
    directory
        .components()
        .collect::<PathBuf>()
        .to_string_lossy()
        .into_owned()
}

pub fn wp_version_key(directory: &str) -> String {
    format!("{WP_VERSION_PREFIX}{directory}")
}

pub fn php_functions_key(version: &str) -> String {
    format!("{PHP_FUNCTIONS_PREFIX}{version}")
}

pub fn wp_functions_key(directory: &str, version: &str) -> String {
    format!("{WP_FUNCTIONS_PREFIX}{directory}:{version}")
}

fn is_catalog_key(key: &str) -> bool {
    key.starts_with(PHP_FUNCTIONS_PREFIX) || key.starts_with(WP_FUNCTIONS_PREFIX)
}

type Entries = Mutex<BTreeMap<String, Value>>;

pub struct CatalogStore {
    entries: Arc<Entries>,
    /// `None` for in-memory stores (tests).
    disk: Option<Arc<DiskFile>>,
}

/// Write-behind state of the backing file.  Every mutation bumps
/// `revision` under the entries lock; a writer snapshots the map together
/// with its revision and records it in `written` once on disk.
struct DiskFile {
    path: PathBuf,
    write_lock: Mutex<()>,
    revision: AtomicU64,
    written: AtomicU64,
    scheduled: AtomicBool,
}

impl CatalogStore {
    /// Open the store at `path`.  A missing file starts empty; an unreadable
    /// or corrupt one is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::read_file(&path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Starting with an empty store: {e}");
                BTreeMap::new()
            }
        };
        debug!("Opened store {} with {} keys", path.display(), entries.len());
        Self {
            entries: Arc::new(Mutex::new(entries)),
            disk: Some(Arc::new(DiskFile {
                path,
                write_lock: Mutex::new(()),
                revision: AtomicU64::new(0),
                written: AtomicU64::new(0),
                scheduled: AtomicBool::new(false),
            })),
        }
    }

    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            entries: Arc::new(Mutex::new(BTreeMap::new())),
            disk: None,
        }
    }

    fn read_file(path: &Path) -> Result<BTreeMap<String, Value>, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    /// Store `value` under `key`.  Empty arrays under catalog keys are
    /// refused so a failed load can never be remembered.  Returns whether
    /// the value was written.
    pub fn set(&self, key: &str, value: Value) -> bool {
        if is_catalog_key(key) && value.as_array().is_some_and(|a| a.is_empty()) {
            debug!("Refusing to cache empty catalog under {key}");
            return false;
        }
        {
            let mut entries = self.entries.lock();
            entries.insert(key.to_string(), value);
            self.touch();
        }
        self.schedule_write();
        true
    }

    pub fn delete(&self, key: &str) -> bool {
        let removed = {
            let mut entries = self.entries.lock();
            let removed = entries.remove(key).is_some();
            if removed {
                self.touch();
            }
            removed
        };
        if removed {
            self.schedule_write();
        }
        removed
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    // ── Typed helpers ───────────────────────────────────────────────────

    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn set_string(&self, key: &str, value: &str) -> bool {
        self.set(key, Value::String(value.to_string()))
    }

    /// A cached catalog, or `None` when missing, malformed, or empty.
    pub fn get_catalog(&self, key: &str) -> Option<Catalog> {
        let value = self.get(key)?;
        match serde_json::from_value::<Catalog>(value) {
            Ok(catalog) if !catalog.is_empty() => Some(catalog),
            Ok(_) => None,
            Err(e) => {
                warn!("Ignoring malformed cached catalog {key}: {e}");
                None
            }
        }
    }

    pub fn set_catalog(&self, key: &str, catalog: &Catalog) -> bool {
        if catalog.is_empty() {
            debug!("Refusing to cache empty catalog under {key}");
            return false;
        }
        match serde_json::to_value(catalog) {
            Ok(value) => self.set(key, value),
            Err(e) => {
                warn!("Could not serialize catalog for {key}: {e}");
                false
            }
        }
    }

    /// Remove every WordPress-scoped key (catalogs and the detected
    /// version) belonging to `directory`.  PHP catalogs and other
    /// directories' keys are left alone.  Returns the number removed.
    pub fn clear_for_directory(&self, directory: &str) -> usize {
        let catalog_prefix = format!("{WP_FUNCTIONS_PREFIX}{directory}:");
        let version_key = wp_version_key(directory);

        let removed = {
            let mut entries = self.entries.lock();
            let doomed: Vec<String> = entries
                .keys()
                .filter(|k| k.starts_with(&catalog_prefix) || **k == version_key)
                .cloned()
                .collect();
            for key in &doomed {
                entries.remove(key);
            }
            if !doomed.is_empty() {
                self.touch();
            }
            doomed.len()
        };
        if removed > 0 {
            self.schedule_write();
        }
        removed
    }

    pub fn recent_directories(&self) -> Vec<String> {
        self.get(RECENT_DIRECTORIES_KEY)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// Move `directory` to the front of the recent list (de-duplicated,
    /// truncated) and return the new list.
    pub fn add_recent_directory(&self, directory: &str) -> Vec<String> {
        let mut dirs = self.recent_directories();
        dirs.retain(|d| d != directory);
        dirs.insert(0, directory.to_string());
        dirs.truncate(MAX_RECENT_DIRECTORIES);
        self.set(RECENT_DIRECTORIES_KEY, Value::from(dirs.clone()));
        dirs
    }

    pub fn remove_recent_directory(&self, directory: &str) -> Vec<String> {
        let mut dirs = self.recent_directories();
        dirs.retain(|d| d != directory);
        self.set(RECENT_DIRECTORIES_KEY, Value::from(dirs.clone()));
        dirs
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Write the current contents to disk now, on the calling thread.
    /// Used on shutdown and drop.
    pub fn flush(&self) -> Result<(), StoreError> {
        match &self.disk {
            Some(disk) => disk.write(&self.entries, true),
            None => Ok(()),
        }
    }

    /// Like [`flush`](Self::flush), but the write runs on the blocking
    /// pool so request handlers never wait on the file system.
    pub async fn flush_async(&self) -> Result<(), StoreError> {
        let Some(disk) = self.disk.clone() else {
            return Ok(());
        };
        let entries = Arc::clone(&self.entries);
        tokio::task::spawn_blocking(move || disk.write(&entries, true)).await?
    }

    /// Record a mutation.  Must be called with the entries lock held.
    fn touch(&self) {
        if let Some(disk) = &self.disk {
            disk.revision.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Queue a write of the latest contents.  Inside a tokio runtime it
    /// runs on the blocking pool and coalesces with writes already queued;
    /// outside one it runs inline.
    fn schedule_write(&self) {
        let Some(disk) = &self.disk else {
            return;
        };
        if disk.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        let disk = Arc::clone(disk);
        let entries = Arc::clone(&self.entries);
        let job = move || {
            if let Err(e) = disk.write(&entries, false) {
                warn!("Failed to persist store: {e}");
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
            }
            Err(_) => job(),
        }
    }
}

impl Drop for CatalogStore {
    fn drop(&mut self) {
        let Some(disk) = &self.disk else {
            return;
        };
        if disk.written.load(Ordering::Acquire) != disk.revision.load(Ordering::Acquire)
            && let Err(e) = self.flush()
        {
            warn!("Failed to persist store on drop: {e}");
        }
    }
}

impl DiskFile {
    /// Serialize a snapshot of `entries` and replace the file atomically.
    /// Without `force`, a snapshot that is already on disk is skipped.
    fn write(&self, entries: &Entries, force: bool) -> Result<(), StoreError> {
        let _writer = self.write_lock.lock();
        self.scheduled.store(false, Ordering::Release);

        let (revision, json) = {
            let entries = entries.lock();
            let revision = self.revision.load(Ordering::Acquire);
            if !force && revision == self.written.load(Ordering::Acquire) {
                return Ok(());
            }
            let json = serde_json::to_vec(&*entries).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;
            (revision, json)
        };

        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        self.written.store(revision, Ordering::Release);
        debug!("Wrote store revision {revision} to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FunctionEntry;
    use serde_json::json;

    fn entry(name: &str) -> FunctionEntry {
        FunctionEntry {
            name: name.to_string(),
            kind: Default::default(),
            documentation: String::new(),
            insert_text: format!("{name}()"),
            signature: format!("void {name}()"),
            source: "core".to_string(),
        }
    }

    #[test]
    fn catalog_set_then_get() {
        let store = CatalogStore::in_memory();
        let catalog = vec![entry("strlen"), entry("str_contains")];
        assert!(store.set_catalog("php-functions:8.1", &catalog));
        assert_eq!(store.get_catalog("php-functions:8.1"), Some(catalog));
    }

    #[test]
    fn empty_catalog_is_never_written() {
        let store = CatalogStore::in_memory();
        assert!(!store.set_catalog("php-functions:8.1", &Vec::new()));
        assert!(!store.set("wp-functions:/a:6.4", json!([])));
        assert!(store.keys().is_empty());
    }

    #[test]
    fn empty_or_malformed_cached_catalog_is_a_miss() {
        let store = CatalogStore::in_memory();
        store.set("php-functions:8.2", json!({ "not": "a list" }));
        assert_eq!(store.get_catalog("php-functions:8.2"), None);
        assert_eq!(store.get_catalog("php-functions:9.9"), None);
    }

    #[test]
    fn clear_for_directory_only_touches_that_directory() {
        let store = CatalogStore::in_memory();
        store.set_catalog("wp-functions:/a/wp:6.4", &vec![entry("get_post")]);
        store.set_catalog("wp-functions:/b/wp:6.4", &vec![entry("get_post")]);
        store.set_catalog("php-functions:8.1", &vec![entry("strlen")]);
        store.set_string("wpVersion:/a/wp", "6.4.2");

        assert_eq!(store.clear_for_directory("/a/wp"), 2);
        assert_eq!(
            store.keys(),
            vec!["php-functions:8.1".to_string(), "wp-functions:/b/wp:6.4".to_string()]
        );
    }

    #[test]
    fn clear_for_directory_does_not_match_sibling_prefix() {
        let store = CatalogStore::in_memory();
        store.set_catalog("wp-functions:/a/wp2:6.4", &vec![entry("get_post")]);
        assert_eq!(store.clear_for_directory("/a/wp"), 0);
        assert_eq!(store.keys().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn directory_keys_ignore_trailing_separators() {
        assert_eq!(directory_key(Path::new("/srv/wp/")), "/srv/wp");
        assert_eq!(directory_key(Path::new("/srv/./wp")), "/srv/wp");
        assert_eq!(directory_key(Path::new("/srv/wp")), "/srv/wp");
    }

    #[test]
    fn recent_directories_are_bounded_and_deduplicated() {
        let store = CatalogStore::in_memory();
        for dir in ["/1", "/2", "/3", "/4", "/5", "/6"] {
            store.add_recent_directory(dir);
        }
        let dirs = store.add_recent_directory("/3");
        assert_eq!(dirs, vec!["/3", "/6", "/5", "/4", "/2"]);
        assert_eq!(store.remove_recent_directory("/5"), vec!["/3", "/6", "/4", "/2"]);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        {
            let store = CatalogStore::open(&path);
            store.set_string(CUSTOM_PHP_PATH_KEY, "/usr/bin/php");
            store.set_catalog("php-functions:8.3", &vec![entry("array_map")]);
        }
        let store = CatalogStore::open(&path);
        assert_eq!(store.get_string(CUSTOM_PHP_PATH_KEY).as_deref(), Some("/usr/bin/php"));
        assert_eq!(store.get_catalog("php-functions:8.3").unwrap()[0].name, "array_map");
    }

    #[tokio::test]
    async fn mutations_inside_a_runtime_are_written_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = CatalogStore::open(&path);
        store.set_string(PHP_VERSION_KEY, "8.1.5");
        store.set_catalog("php-functions:8.1", &vec![entry("strlen")]);

        let mut on_disk = None;
        for _ in 0..100 {
            on_disk = CatalogStore::read_file(&path)
                .ok()
                .filter(|entries| entries.contains_key("php-functions:8.1"));
            if on_disk.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        let on_disk = on_disk.expect("write-behind never reached the file");
        assert_eq!(on_disk.get(PHP_VERSION_KEY), Some(&json!("8.1.5")));
    }

    #[tokio::test]
    async fn flush_async_writes_latest_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = CatalogStore::open(&path);
        store.set_string(CUSTOM_PHP_PATH_KEY, "/usr/bin/php");
        store.delete(CUSTOM_PHP_PATH_KEY);
        store.set_string(PHP_VERSION_KEY, "8.2.1");

        store.flush_async().await.unwrap();
        let on_disk = CatalogStore::read_file(&path).unwrap();
        assert_eq!(on_disk.get(PHP_VERSION_KEY), Some(&json!("8.2.1")));
        assert!(!on_disk.contains_key(CUSTOM_PHP_PATH_KEY));
    }

    #[tokio::test]
    async fn dropping_the_store_persists_pending_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let store = CatalogStore::open(&path);
            store.add_recent_directory("/srv/wp");
        }
        let store = CatalogStore::open(&path);
        assert_eq!(store.recent_directories(), vec!["/srv/wp"]);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = CatalogStore::open(&path);
        assert!(store.keys().is_empty());
        store.set_string(PHP_VERSION_KEY, "8.1.5");
        assert!(store.flush().is_ok());
    }
}
