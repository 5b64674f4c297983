//! Filesystem-backed byte store.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::{fs, io};

use tempfile::{Builder, NamedTempFile};

use super::ByteStore;
use crate::error::{PersistenceError, Result};

/// One lock per path, shared by every `FileStore` in the process.
static PATH_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    let mut locks = PATH_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(path.to_path_buf()).or_default())
}

/// Stores each state file on disk.
///
/// Writes go to a uniquely named sibling temp file that is synced and then
/// renamed over the target, so a reader never sees a partial snapshot.
/// Reads, writes, and deletes of one path are serialized across every
/// `FileStore` in the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStore;

impl FileStore {
    pub fn new() -> Self {
        Self
    }
}

/// Create `<file name>XXXXXX.tmp` next to `path`.
fn temp_file_for(path: &Path) -> io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = path
        .file_name()
        .map_or_else(|| "state".into(), |name| name.to_string_lossy());
    Builder::new()
        .prefix(&*prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
}

impl ByteStore for FileStore {
    fn read_all(&self, path: &Path) -> Result<Vec<u8>> {
        let lock = path_lock(path);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        fs::read(path).map_err(|e| PersistenceError::Io {
            operation: "read",
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn write_all(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let lock = path_lock(path);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut temp = temp_file_for(path).map_err(|e| PersistenceError::Io {
            operation: "create",
            path: path.to_path_buf(),
            source: e,
        })?;
        let temp_path = temp.path().to_path_buf();

        temp.write_all(bytes).map_err(|e| PersistenceError::Io {
            operation: "write",
            path: temp_path.clone(),
            source: e,
        })?;

        temp.as_file().sync_all().map_err(|e| PersistenceError::Io {
            operation: "sync",
            path: temp_path.clone(),
            source: e,
        })?;

        // A failed persist drops the temp file, which removes it.
        temp.persist(path)
            .map_err(|e| PersistenceError::AtomicWriteFailed {
                temp_path,
                target_path: path.to_path_buf(),
                source: e.error,
            })?;

        tracing::debug!(bytes = bytes.len(), "Wrote {}", path.display());
        Ok(())
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).map_err(|e| PersistenceError::Io {
                operation: "create directory",
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        if !path.is_dir() {
            return Err(PersistenceError::NotADirectory {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    fn clear_dir(&self, path: &Path) -> Result<usize> {
        if !path.is_dir() {
            return Ok(0);
        }

        let entries = fs::read_dir(path).map_err(|e| PersistenceError::Io {
            operation: "list",
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| PersistenceError::Io {
                operation: "list",
                path: path.to_path_buf(),
                source: e,
            })?;
            let file_path = entry.path();
            if !file_path.is_file() {
                continue;
            }

            let lock = path_lock(&file_path);
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            fs::remove_file(&file_path).map_err(|e| PersistenceError::Io {
                operation: "delete",
                path: file_path.clone(),
                source: e,
            })?;
            removed += 1;
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_replaces_whole_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".state-app.Main");
        let store = FileStore::new();

        store.write_all(&path, b"a much longer first version").unwrap();
        store.write_all(&path, b"short").unwrap();

        assert_eq!(store.read_all(&path).unwrap(), b"short");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let err = FileStore::new()
            .read_all(&dir.path().join("missing"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_ensure_dir_rejects_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::new();

        let nested = dir.path().join("a").join("b");
        store.ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());

        let file = dir.path().join("plain");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            store.ensure_dir(&file),
            Err(PersistenceError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_clear_dir() {
        let dir = tempdir().unwrap();
        let store = FileStore::new();
        store.write_all(&dir.path().join("one"), b"1").unwrap();
        store.write_all(&dir.path().join("two"), b"2").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        assert_eq!(store.clear_dir(dir.path()).unwrap(), 2);
        assert!(dir.path().join("sub").is_dir());
        assert_eq!(store.clear_dir(&dir.path().join("missing")).unwrap(), 0);
    }

    #[test]
    fn test_concurrent_writers_never_interleave() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".state-app.Shared");
        let store = FileStore::new();

        let handles: Vec<_> = (0..8u8)
            .map(|n| {
                let path = path.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        store.write_all(&path, &[n; 512]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let bytes = store.read_all(&path).unwrap();
        assert_eq!(bytes.len(), 512);
        assert!(bytes.iter().all(|b| *b == bytes[0]));
    }

    #[test]
    fn test_independent_stores_share_path_locks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".state-app.Shared");

        let handles: Vec<_> = (0..4u8)
            .map(|n| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let store = FileStore::new();
                    let payload = vec![n; 64 * 1024];
                    for _ in 0..50 {
                        store.write_all(&path, &payload).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let bytes = FileStore::new().read_all(&path).unwrap();
        assert_eq!(bytes.len(), 64 * 1024);
        assert!(bytes.iter().all(|b| *b == bytes[0]));
        // No temp files are left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
