//! View model state: the in-memory record, its backing file, and the cell cache.

use std::any::{Any, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use rvm_persistence::{
    ByteStore, FromStateValue, PendingWrite, StateRecord, StateValue, ToStateValue, load_record,
    prepare_write, save_record,
};

use crate::cell::StateCell;
use crate::error::{Result, ViewModelError};

/// A type whose observable state is persisted by a provider.
///
/// Implementors embed a [`ViewModelState`] and expose their cells through it:
///
/// ```ignore
/// #[derive(Default)]
/// struct SearchViewModel {
///     state: ViewModelState,
/// }
///
/// impl ViewModel for SearchViewModel {
///     fn state(&self) -> &ViewModelState {
///         &self.state
///     }
/// }
///
/// impl SearchViewModel {
///     fn query(&self) -> rvm_viewmodel::Result<StateCell<String>> {
///         self.state.get_or_create_with("query", String::new())
///     }
/// }
/// ```
pub trait ViewModel: 'static {
    fn state(&self) -> &ViewModelState;
}

pub(crate) struct StateInner {
    store: Option<Arc<dyn ByteStore>>,
    file: Option<PathBuf>,
    record: Option<StateRecord>,
    save_required: bool,
    detached: bool,
    cache: HashMap<String, Rc<dyn Any>>,
}

/// Shared state behind a view model.
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct ViewModelState {
    inner: Rc<RefCell<StateInner>>,
}

impl Default for ViewModelState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ViewModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ViewModelState")
            .field("file", &inner.file)
            .field("record", &inner.record)
            .field("save_required", &inner.save_required)
            .field("detached", &inner.detached)
            .field("cells", &inner.cache.len())
            .finish()
    }
}

impl ViewModelState {
    /// Create an uninitialized state. Saves are required until told otherwise.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(StateInner {
                store: None,
                file: None,
                record: None,
                save_required: true,
                detached: false,
                cache: HashMap::new(),
            })),
        }
    }

    /// Bind the state to its backing file and assemble the initial record.
    ///
    /// The record starts from `default_state`; when `restore` is set, the
    /// saved record is overlaid on top (saved values win). A missing or
    /// unreadable file is logged and ignored. Calling this twice fails.
    pub fn initialize(
        &self,
        store: Arc<dyn ByteStore>,
        file: PathBuf,
        restore: bool,
        default_state: Option<&StateRecord>,
    ) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.file.is_some() || inner.record.is_some() {
            return Err(ViewModelError::AlreadyInitialized);
        }

        let mut record = default_state.cloned().unwrap_or_default();
        if restore {
            match load_record(store.as_ref(), &file) {
                Ok(restored) => record.merge(restored),
                Err(e) if e.is_not_found() => {
                    tracing::debug!("No saved state at {}", file.display());
                }
                Err(e) if e.is_decode_error() => {
                    tracing::warn!(
                        error = %e,
                        suggestion = e.suggestion().unwrap_or_default(),
                        "Discarding unreadable saved state at {}, continuing with defaults",
                        file.display()
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Could not restore state from {}, continuing with defaults",
                        file.display()
                    );
                }
            }
        }

        inner.store = Some(store);
        inner.file = Some(file);
        inner.record = Some(record);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.borrow().record.is_some()
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        self.inner.borrow().file.clone()
    }

    pub fn is_save_required(&self) -> bool {
        self.inner.borrow().save_required
    }

    /// Whether every cell write should immediately persist the record.
    pub fn set_save_required(&self, required: bool) {
        self.inner.borrow_mut().save_required = required;
    }

    /// Copy of the current record.
    pub fn snapshot(&self) -> Result<StateRecord> {
        let inner = self.inner.borrow();
        inner.record.clone().ok_or_else(|| unusable(&inner))
    }

    /// Keys that already have a cell.
    pub fn cached_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.borrow().cache.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Get the cell for `key`, creating it if needed.
    ///
    /// A new cell is seeded from the record, or left unset when the record
    /// has no value for `key`.
    pub fn get_or_create<T>(&self, key: &str) -> Result<StateCell<T>>
    where
        T: ToStateValue + FromStateValue + Clone + 'static,
    {
        self.lookup(key, None)
    }

    /// Get the cell for `key`, creating it with `initial_value` if needed.
    ///
    /// A value already in the record (from defaults or restore) wins over
    /// `initial_value`, and a cached cell is returned unchanged.
    pub fn get_or_create_with<T>(&self, key: &str, initial_value: T) -> Result<StateCell<T>>
    where
        T: ToStateValue + FromStateValue + Clone + 'static,
    {
        self.lookup(key, Some(initial_value))
    }

    fn lookup<T>(&self, key: &str, initial_value: Option<T>) -> Result<StateCell<T>>
    where
        T: ToStateValue + FromStateValue + Clone + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let Some(record) = inner.record.as_ref() else {
            return Err(unusable(&inner));
        };

        let mismatch = || ViewModelError::TypeMismatch {
            key: key.to_string(),
            expected: type_name::<T>(),
        };

        if let Some(cached) = inner.cache.get(key) {
            return cached
                .downcast_ref::<StateCell<T>>()
                .cloned()
                .ok_or_else(mismatch);
        }

        let seed = match record.get(key) {
            Some(stored) => Some(T::from_state_value(stored).ok_or_else(mismatch)?),
            None => initial_value,
        };

        let cell = StateCell::new(key, seed, Rc::downgrade(&self.inner));
        inner
            .cache
            .insert(key.to_string(), Rc::new(cell.clone()) as Rc<dyn Any>);
        Ok(cell)
    }

    /// Encode the whole record and write it to the backing file.
    ///
    /// Failures are returned, never swallowed.
    pub fn save_state(&self) -> Result<()> {
        let (store, file, record) = self.save_parts()?;
        save_record(store.as_ref(), &file, &record).map_err(ViewModelError::Save)
    }

    /// Encode the record now; write it later with [`PendingWrite::commit`]
    /// or [`PendingWrite::commit_async`].
    pub fn prepare_save(&self) -> Result<PendingWrite> {
        let (store, file, record) = self.save_parts()?;
        prepare_write(store, file, &record).map_err(ViewModelError::Save)
    }

    fn save_parts(&self) -> Result<(Arc<dyn ByteStore>, PathBuf, StateRecord)> {
        let inner = self.inner.borrow();
        match (&inner.store, &inner.file, &inner.record) {
            (Some(store), Some(file), Some(record)) => {
                Ok((Arc::clone(store), file.clone(), record.clone()))
            }
            _ => Err(unusable(&inner)),
        }
    }

    /// Drop the record and cells; existing cells keep working in memory only.
    pub(crate) fn detach(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.record = None;
        inner.cache.clear();
        inner.detached = true;
    }

    fn write_through(&self, key: &str, value: StateValue) -> Result<()> {
        let save_required = {
            let mut inner = self.inner.borrow_mut();
            let Some(record) = inner.record.as_mut() else {
                return Ok(());
            };
            record.insert(key, value);
            inner.save_required
        };
        if save_required {
            self.save_state()?;
        }
        Ok(())
    }
}

fn unusable(inner: &StateInner) -> ViewModelError {
    if inner.detached {
        ViewModelError::Detached
    } else {
        ViewModelError::NotInitialized
    }
}

/// Record a cell write in its owner, if the owner is still alive.
pub(crate) fn write_through(
    owner: &Weak<RefCell<StateInner>>,
    key: &str,
    value: StateValue,
) -> Result<()> {
    match owner.upgrade() {
        Some(inner) => ViewModelState { inner }.write_through(key, value),
        None => Ok(()),
    }
}
