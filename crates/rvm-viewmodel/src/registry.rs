//! Registry of live view models, keyed by owner type and view model type.
//!
//! The registry outlives individual owner instances: a recreated owner of
//! the same type finds the view models its predecessor created, still live.
//! Hosts create one registry for the life of the process and pass it to
//! every provider.

use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use rvm_persistence::{ByteStore, FileStore, StateRecord, StorageConfig};

use crate::error::{Result, ViewModelError};
use crate::state::{ViewModel, ViewModelState};

/// Identifies the owner a provider is created for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnerDescriptor {
    /// Fully-qualified owner type name; one state directory per name.
    pub type_name: String,
    /// Launch arguments used as every view model's default state.
    pub launch_arguments: Option<StateRecord>,
}

impl OwnerDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            launch_arguments: None,
        }
    }

    /// Describe an owner by its Rust type.
    pub fn of<O: ?Sized + 'static>() -> Self {
        Self::new(type_name::<O>())
    }

    #[must_use]
    pub fn with_launch_arguments(mut self, arguments: StateRecord) -> Self {
        self.launch_arguments = Some(arguments);
        self
    }
}

struct RegisteredViewModel {
    type_name: &'static str,
    instance: Rc<dyn Any>,
    state: ViewModelState,
}

type OwnerEntry = HashMap<TypeId, RegisteredViewModel>;

struct RegistryInner {
    base_dir: PathBuf,
    config: StorageConfig,
    store: Arc<dyn ByteStore>,
    owners: RefCell<HashMap<String, OwnerEntry>>,
}

/// Process-lifetime map of owner type → view model type → live instance.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct ViewModelRegistry {
    inner: Rc<RegistryInner>,
}

impl fmt::Debug for ViewModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owners = self.inner.owners.borrow();
        let mut map = f.debug_map();
        for (owner, entry) in owners.iter() {
            let names: Vec<_> = entry.values().map(|vm| vm.type_name).collect();
            map.entry(owner, &names);
        }
        map.finish()
    }
}

impl ViewModelRegistry {
    /// A registry storing files under `base_dir` with the default layout.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_parts(base_dir, StorageConfig::default(), Arc::new(FileStore::new()))
    }

    /// A registry with an explicit layout and byte store.
    pub fn with_parts(
        base_dir: impl Into<PathBuf>,
        config: StorageConfig,
        store: Arc<dyn ByteStore>,
    ) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                base_dir: base_dir.into(),
                config,
                store,
                owners: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.inner.base_dir
    }

    pub fn config(&self) -> &StorageConfig {
        &self.inner.config
    }

    pub fn store(&self) -> Arc<dyn ByteStore> {
        Arc::clone(&self.inner.store)
    }

    /// State directory for one owner type.
    pub fn owner_dir(&self, owner_type: &str) -> PathBuf {
        self.inner.config.owner_dir(&self.inner.base_dir, owner_type)
    }

    /// State file for one view model type of one owner type.
    pub fn state_file<VM: ViewModel>(&self, owner_type: &str) -> PathBuf {
        self.inner
            .config
            .state_file(&self.owner_dir(owner_type), type_name::<VM>())
    }

    /// Number of owner types with at least one registered view model.
    pub fn owner_count(&self) -> usize {
        self.inner
            .owners
            .borrow()
            .values()
            .filter(|entry| !entry.is_empty())
            .count()
    }

    pub fn view_model_count(&self, owner_type: &str) -> usize {
        self.inner
            .owners
            .borrow()
            .get(owner_type)
            .map_or(0, HashMap::len)
    }

    pub fn contains<VM: ViewModel>(&self, owner_type: &str) -> bool {
        self.inner
            .owners
            .borrow()
            .get(owner_type)
            .is_some_and(|entry| entry.contains_key(&TypeId::of::<VM>()))
    }

    pub(crate) fn lookup<VM: ViewModel>(&self, owner_type: &str) -> Option<Rc<VM>> {
        let owners = self.inner.owners.borrow();
        let registered = owners.get(owner_type)?.get(&TypeId::of::<VM>())?;
        Rc::clone(&registered.instance).downcast::<VM>().ok()
    }

    pub(crate) fn insert<VM: ViewModel>(&self, owner_type: &str, view_model: Rc<VM>) {
        let state = view_model.state().clone();
        self.inner
            .owners
            .borrow_mut()
            .entry(owner_type.to_string())
            .or_default()
            .insert(
                TypeId::of::<VM>(),
                RegisteredViewModel {
                    type_name: type_name::<VM>(),
                    instance: view_model,
                    state,
                },
            );
    }

    /// States of every view model registered for `owner_type`.
    pub(crate) fn states(&self, owner_type: &str) -> Vec<ViewModelState> {
        self.inner
            .owners
            .borrow()
            .get(owner_type)
            .map(|entry| entry.values().map(|vm| vm.state.clone()).collect())
            .unwrap_or_default()
    }

    /// Delete the state files of `owner_type`, then forget its view models.
    ///
    /// Evicted view models are detached: cells still held elsewhere keep
    /// working in memory but no longer write to disk. If a file cannot be
    /// deleted, nothing is evicted.
    pub fn clear_owner(&self, owner_type: &str) -> Result<usize> {
        let dir = self.owner_dir(owner_type);
        let removed = self
            .inner
            .store
            .clear_dir(&dir)
            .map_err(|source| ViewModelError::ClearState {
                path: dir.clone(),
                source,
            })?;

        let evicted = self.inner.owners.borrow_mut().remove(owner_type);
        if let Some(entry) = evicted {
            for vm in entry.values() {
                vm.state.detach();
            }
        }
        tracing::info!(owner = owner_type, removed, "Cleared saved state");
        Ok(removed)
    }
}
