//! In-memory byte store.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::ByteStore;
use crate::error::{PersistenceError, Result};

/// Keeps every "file" in a map behind one mutex.
///
/// Useful for hosts without a writable filesystem and for exercising save
/// failures: [`MemoryStore::set_fail_writes`] makes every write and delete
/// fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dirs(&self) -> MutexGuard<'_, BTreeSet<PathBuf>> {
        self.dirs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self, operation: &'static str, path: &Path) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Io {
                operation,
                path: path.to_path_buf(),
                source: std::io::Error::other("writes are disabled on this store"),
            });
        }
        Ok(())
    }

    /// Make subsequent writes and deletes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current contents of `path`, if any.
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.files().get(path).cloned()
    }

    /// Seed a file directly, bypassing the write counter.
    pub fn insert(&self, path: impl Into<PathBuf>, bytes: Vec<u8>) {
        self.files().insert(path.into(), bytes);
    }

    /// Whether `ensure_dir` has created `path`.
    pub fn has_dir(&self, path: &Path) -> bool {
        self.dirs().contains(path)
    }

    /// Every stored path, in order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files().keys().cloned().collect()
    }
}

impl ByteStore for MemoryStore {
    fn read_all(&self, path: &Path) -> Result<Vec<u8>> {
        self.contents(path).ok_or_else(|| PersistenceError::Io {
            operation: "read",
            path: path.to_path_buf(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
    }

    fn write_all(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.check_writable("write", path)?;
        if self.has_dir(path) {
            return Err(PersistenceError::Io {
                operation: "write",
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::IsADirectory),
            });
        }
        self.files().insert(path.to_path_buf(), bytes.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        if self.files().contains_key(path) {
            return Err(PersistenceError::NotADirectory {
                path: path.to_path_buf(),
            });
        }
        self.dirs().insert(path.to_path_buf());
        Ok(())
    }

    fn clear_dir(&self, path: &Path) -> Result<usize> {
        self.check_writable("delete", path)?;
        let mut files = self.files();
        let before = files.len();
        files.retain(|file, _| file.parent() != Some(path));
        Ok(before - files.len())
    }
}
