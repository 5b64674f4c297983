//! View model error types.

use std::path::PathBuf;

use rvm_persistence::PersistenceError;
use thiserror::Error;

/// Errors raised by view models, cells, and providers.
///
/// Restore failures never appear here: they are logged and the view model
/// continues with its default state.
#[derive(Debug, Error)]
pub enum ViewModelError {
    /// `initialize` was called on a state that already has a backing file.
    #[error("View model state is already initialized")]
    AlreadyInitialized,

    /// The state was used before `initialize`.
    #[error("View model state is not initialized")]
    NotInitialized,

    /// The state was evicted from its registry and no longer persists.
    #[error("View model state has been detached from its registry")]
    Detached,

    /// Writing durable state failed. Never swallowed.
    #[error("Failed to save view model state")]
    Save(#[source] PersistenceError),

    /// The per-owner state directory is unusable.
    #[error("Unusable state directory {path}")]
    Directory {
        path: PathBuf,
        #[source]
        source: PersistenceError,
    },

    /// Stale state files could not be removed on a fresh start.
    #[error("Failed to clear stale state in {path}")]
    ClearState {
        path: PathBuf,
        #[source]
        source: PersistenceError,
    },

    /// The provider was used after its owner was destroyed.
    #[error("View model provider used after its owner was destroyed")]
    ProviderReleased,

    /// A cell was requested with a type that does not match the stored value.
    #[error("State key '{key}' does not hold a value of type {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

/// Result type alias for view model operations.
pub type Result<T> = std::result::Result<T, ViewModelError>;
