//! View models whose observable state survives process death.
//!
//! A view model keeps its state in named [`StateCell`]s. Every write goes
//! into the view model's in-memory record; while the owner is in the
//! background the whole record is also written to one file per view model,
//! so a recreated process can pick up where the old one left off.
//!
//! # Pieces
//!
//! - [`ViewModelRegistry`]: process-lifetime map of live view models
//! - [`ViewModelProvider`]: one per owner instance; creates, restores, and
//!   checkpoints that owner's view models as lifecycle events arrive
//! - [`ViewModelState`]: the record, backing file, and cell cache behind a
//!   [`ViewModel`]
//! - [`Lifecycle`]: a plain [`LifecycleSource`] for host bindings and tests
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use rvm_viewmodel::{
//!     Lifecycle, LifecycleEvent, OwnerDescriptor, PauseReason, ViewModelProvider, ViewModelRegistry,
//! };
//!
//! let registry = ViewModelRegistry::new(app_data_dir);
//! let lifecycle = Rc::new(Lifecycle::new());
//! let provider = ViewModelProvider::new(
//!     &registry,
//!     OwnerDescriptor::new("app::SearchScreen"),
//!     saved_instance_state,
//!     Some(lifecycle.clone()),
//! )?;
//!
//! let vm = provider.get::<SearchViewModel>()?;
//! vm.query()?.set("rust".to_string())?;
//! lifecycle.dispatch(LifecycleEvent::Paused(PauseReason::Backgrounded))?;
//! ```
//!
//! Everything here is single-threaded; handles are `Rc`-based and are not
//! `Send`. Only the byte store underneath is shared across threads.

mod cell;
mod error;
mod lifecycle;
mod provider;
mod registry;
mod state;

pub use cell::{StateCell, Subscription};
pub use error::{Result, ViewModelError};
pub use lifecycle::{
    Lifecycle, LifecycleEvent, LifecycleHandler, LifecycleSource, PauseReason, SubscriptionId,
};
pub use provider::{ProviderMode, ViewModelProvider};
pub use registry::{OwnerDescriptor, ViewModelRegistry};
pub use state::{ViewModel, ViewModelState};

pub use rvm_persistence::{
    ByteStore, Bytes, FileStore, FromStateValue, MemoryStore, PendingWrite, StateRecord, StateValue,
    StorageConfig, ToStateValue,
};
