//! Whole-file byte storage for state records.
//!
//! This module handles:
//! - The [`ByteStore`] seam (filesystem or memory)
//! - Loading and saving whole state records
//! - Deferred writes that can run on a blocking thread pool

mod file;
mod memory;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::codec;
use crate::error::{PersistenceError, Result};
use crate::value::StateRecord;

/// Reads and writes whole files.
///
/// Every read and write of one path is serialized: a save never interleaves
/// with another save or with a load of the same file.
pub trait ByteStore: Send + Sync {
    /// Read the full contents of `path`.
    fn read_all(&self, path: &Path) -> Result<Vec<u8>>;

    /// Replace the contents of `path` with `bytes`.
    fn write_all(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Create `path` (and parents) if missing; fail if it is not a directory.
    fn ensure_dir(&self, path: &Path) -> Result<()>;

    /// Delete every file directly inside `path`, returning how many were removed.
    ///
    /// A missing directory is not an error.
    fn clear_dir(&self, path: &Path) -> Result<usize>;
}

/// Load and decode the state record stored at `path`.
pub fn load_record(store: &dyn ByteStore, path: &Path) -> Result<StateRecord> {
    let bytes = store.read_all(path)?;
    let record = codec::decode(&bytes)?;
    tracing::info!(entries = record.len(), "Restored state from {}", path.display());
    Ok(record)
}

/// Encode `record` and write it to `path`, replacing the previous snapshot.
pub fn save_record(store: &dyn ByteStore, path: &Path, record: &StateRecord) -> Result<()> {
    let bytes = codec::encode(record)?;
    store.write_all(path, &bytes)?;
    tracing::info!(entries = record.len(), "Saved state to {}", path.display());
    Ok(())
}

/// Encode `record` now and return a write that can be committed later.
///
/// The encoded bytes are a snapshot: later changes to `record` do not affect
/// the pending write.
pub fn prepare_write(
    store: Arc<dyn ByteStore>,
    path: PathBuf,
    record: &StateRecord,
) -> Result<PendingWrite> {
    let bytes = codec::encode(record)?;
    Ok(PendingWrite {
        store,
        path,
        bytes,
        entries: record.len(),
    })
}

/// An encoded snapshot waiting to be written.
pub struct PendingWrite {
    store: Arc<dyn ByteStore>,
    path: PathBuf,
    bytes: Vec<u8>,
    entries: usize,
}

impl std::fmt::Debug for PendingWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingWrite")
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .field("entries", &self.entries)
            .finish()
    }
}

impl PendingWrite {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot on the calling thread.
    pub fn commit(self) -> Result<()> {
        self.store.write_all(&self.path, &self.bytes)?;
        tracing::info!(entries = self.entries, "Saved state to {}", self.path.display());
        Ok(())
    }

    /// Write the snapshot on tokio's blocking thread pool.
    pub async fn commit_async(self) -> Result<()> {
        tokio::task::spawn_blocking(move || self.commit())
            .await
            .map_err(|source| PersistenceError::BackgroundTask { source })?
    }
}
