//! Network-safe `IndexStore` decorator: wraps a local `SqliteStore` and
//! wraps each mutating or reading operation in acquisition of the external
//! file lock (spec.md §4.4 NFS variant, §9 "composes the local one with an
//! external lock wrapper - a decorator, not inheritance").

use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::error::Result;
use crate::file_lock::FileLock;
use crate::sqlite_store::SqliteStore;
use crate::store::{IndexRow, IndexStore};

pub struct SqliteNfsStore {
    index_path: std::path::PathBuf,
    inner: SqliteStore,
    lock_lifetime: Duration,
}

impl SqliteNfsStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_lifetime(path, Duration::from_secs(600))
    }

    pub fn open_with_lifetime(path: &Path, lock_lifetime: Duration) -> Result<Self> {
        Ok(Self {
            index_path: path.to_path_buf(),
            inner: SqliteStore::open(path)?,
            lock_lifetime,
        })
    }

    fn locked<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = FileLock::acquire(&self.index_path, self.lock_lifetime)
            .map_err(|e| crate::error::Error::IndexIo {
                path: self.index_path.clone(),
                reason: e.to_string(),
            })?;
        let result = f();
        drop(lock);
        result
    }
}

impl IndexStore for SqliteNfsStore {
    fn add(&self, path: &Path, min_time: f64, max_time: f64) -> Result<()> {
        self.locked(|| self.inner.add(path, min_time, max_time))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.locked(|| self.inner.remove(path))
    }

    fn indexed(&self, path: &Path) -> Result<bool> {
        self.locked(|| self.inner.indexed(path))
    }

    fn query(&self, begin: Option<f64>, end: Option<f64>) -> Result<Vec<IndexRow>> {
        self.locked(|| self.inner.query(begin, end))
    }

    fn clean(&self) -> Result<()> {
        self.locked(|| self.inner.clean())
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }

    fn modified_at(&self) -> Result<SystemTime> {
        self.inner.modified_at()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_add_query_roundtrip_through_lock() {
        let dir = tempdir().unwrap();
        let store = SqliteNfsStore::open(&dir.path().join("idx.db")).unwrap();
        store.add(Path::new("/a"), 1.0, 2.0).unwrap();
        assert!(store.indexed(Path::new("/a")).unwrap());
        assert_eq!(store.query(None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_lock_file_cleaned_up_after_op() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("idx.db");
        let store = SqliteNfsStore::open(&index_path).unwrap();
        store.add(Path::new("/a"), 1.0, 2.0).unwrap();

        let mut lock_name = index_path.as_os_str().to_os_string();
        lock_name.push(".lock");
        assert!(!std::path::Path::new(&lock_name).exists());
    }
}
