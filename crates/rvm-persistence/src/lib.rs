//! Persistent storage for restorable view model state.
//!
//! A view model's state is a flat record of string keys to [`StateValue`]s.
//! This crate turns that record into a single opaque blob and writes it to
//! exactly one file, replacing the file wholesale on every save.
//!
//! # Features
//!
//! - **Self-describing values** via the closed [`StateValue`] enum
//! - **Integrity checked blobs** (SHA-256 over the rkyv payload)
//! - **Atomic writes** (temp file + rename) serialized per path
//! - **In-memory store** for hosts without a filesystem
//!
//! # File Format
//!
//! ```text
//! +------------------+
//! | Magic: "RVM\x01" | 4 bytes - file identification
//! +------------------+
//! | Version: 1       | 4 bytes - u32 little-endian schema version
//! +------------------+
//! | SHA-256          | 32 bytes - digest of the payload
//! +------------------+
//! | rkyv Payload     | Variable - parallel key / value sequences
//! +------------------+
//! ```
//!
//! # Example
//!
//! ```ignore
//! use rvm_persistence::{FileStore, StateRecord, StateValue, load_record, save_record};
//!
//! let store = FileStore::new();
//! let mut record = StateRecord::new();
//! record.insert("query", StateValue::from("rust"));
//!
//! save_record(&store, Path::new("state.bin"), &record)?;
//! let restored = load_record(&store, Path::new("state.bin"))?;
//! assert_eq!(restored, record);
//! ```

mod codec;
mod config;
mod convert;
mod error;
mod store;
mod value;

pub use codec::{
    CURRENT_SCHEMA_VERSION, DecodedState, MAGIC_BYTES, decode, decode_envelope, encode,
};
pub use config::{
    DEFAULT_PROVIDER_PREFIX, DEFAULT_ROOT_DIR, DEFAULT_STATE_PREFIX, StorageConfig, storage_name,
};
pub use convert::{Bytes, FromStateValue, ToStateValue};
pub use error::{PersistenceError, Result};
pub use store::{
    ByteStore, FileStore, MemoryStore, PendingWrite, load_record, prepare_write, save_record,
};
pub use value::{StateRecord, StateValue};
