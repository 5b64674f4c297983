//! Per-owner view model provider.
//!
//! One provider is created for each owner instance. At construction it
//! decides, once, whether the owner is being restored (a saved-instance
//! token was present) or started fresh. A fresh start wipes every view model
//! previously registered for the owner type, along with its files.
//!
//! # Lifecycle reactions
//!
//! - **Started / Resumed**: saves stop being required; cell writes stay in
//!   memory while the owner is in the foreground.
//! - **Paused / Stopped** (backgrounded): saves become required again and
//!   every view model is saved once, synchronously.
//! - **Paused / Stopped** (configuration change): nothing; the recreated
//!   owner's provider finds the same live view models in the registry.
//! - **Destroyed**: the provider unsubscribes and releases its owner. Files
//!   and registry entries are left alone.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rvm_persistence::StateRecord;

use crate::error::{Result, ViewModelError};
use crate::lifecycle::{LifecycleEvent, LifecycleSource, PauseReason, SubscriptionId};
use crate::registry::{OwnerDescriptor, ViewModelRegistry};
use crate::state::ViewModel;

/// Whether a provider was constructed with a saved-instance token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    Fresh,
    Restoring,
}

struct LifecycleBinding {
    source: Rc<dyn LifecycleSource>,
    subscription: SubscriptionId,
}

/// The provider's hold on its owner; `None` once the owner is destroyed.
struct OwnerBinding {
    lifecycle: Option<LifecycleBinding>,
}

struct ProviderInner {
    registry: ViewModelRegistry,
    owner_type: String,
    dir: PathBuf,
    mode: ProviderMode,
    default_state: Option<StateRecord>,
    save_required: Cell<bool>,
    binding: RefCell<Option<OwnerBinding>>,
}

/// Hands out the view models of one owner instance.
///
/// Cloning yields another handle to the same provider.
#[derive(Clone)]
pub struct ViewModelProvider {
    inner: Rc<ProviderInner>,
}

impl fmt::Debug for ViewModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModelProvider")
            .field("owner_type", &self.inner.owner_type)
            .field("mode", &self.inner.mode)
            .field("save_required", &self.inner.save_required.get())
            .field("released", &self.is_released())
            .finish()
    }
}

impl ViewModelProvider {
    /// Create a provider for one owner instance.
    ///
    /// `saved_instance_state` is the host's signal that this owner is being
    /// recreated from a previous instance. Without it, every view model of
    /// the owner type is evicted and its state files deleted before this
    /// returns. When `lifecycle` is given, the provider subscribes to it.
    pub fn new(
        registry: &ViewModelRegistry,
        owner: OwnerDescriptor,
        saved_instance_state: bool,
        lifecycle: Option<Rc<dyn LifecycleSource>>,
    ) -> Result<Self> {
        let mode = if saved_instance_state {
            ProviderMode::Restoring
        } else {
            ProviderMode::Fresh
        };

        if mode == ProviderMode::Fresh {
            registry.clear_owner(&owner.type_name)?;
        }

        let inner = Rc::new(ProviderInner {
            registry: registry.clone(),
            dir: registry.owner_dir(&owner.type_name),
            owner_type: owner.type_name,
            mode,
            default_state: owner.launch_arguments,
            save_required: Cell::new(true),
            binding: RefCell::new(None),
        });

        let lifecycle = lifecycle.map(|source| {
            let weak = Rc::downgrade(&inner);
            let subscription = source.subscribe(Box::new(move |event| match weak.upgrade() {
                Some(inner) => ViewModelProvider { inner }.on_event(event),
                None => Ok(()),
            }));
            LifecycleBinding {
                source,
                subscription,
            }
        });
        *inner.binding.borrow_mut() = Some(OwnerBinding { lifecycle });

        tracing::debug!(owner = %inner.owner_type, ?mode, "Created view model provider");
        Ok(Self { inner })
    }

    pub fn mode(&self) -> ProviderMode {
        self.inner.mode
    }

    pub fn owner_type(&self) -> &str {
        &self.inner.owner_type
    }

    /// Directory holding this owner type's state files.
    pub fn state_dir(&self) -> &Path {
        &self.inner.dir
    }

    pub fn is_save_required(&self) -> bool {
        self.inner.save_required.get()
    }

    /// Whether the owner has been destroyed.
    pub fn is_released(&self) -> bool {
        self.inner.binding.borrow().is_none()
    }

    /// Get the view model of type `VM`, constructing it with `Default` if
    /// the registry has none for this owner type.
    pub fn get<VM: ViewModel + Default>(&self) -> Result<Rc<VM>> {
        self.get_with(VM::default)
    }

    /// Get the view model of type `VM`, constructing it with `factory` if
    /// the registry has none for this owner type.
    ///
    /// A registered instance is returned unchanged, whatever this provider's
    /// mode or default state: the first construction wins.
    pub fn get_with<VM: ViewModel>(&self, factory: impl FnOnce() -> VM) -> Result<Rc<VM>> {
        if self.is_released() {
            return Err(ViewModelError::ProviderReleased);
        }

        let registry = &self.inner.registry;
        if let Some(existing) = registry.lookup::<VM>(&self.inner.owner_type) {
            return Ok(existing);
        }

        let store = registry.store();
        store
            .ensure_dir(&self.inner.dir)
            .map_err(|source| ViewModelError::Directory {
                path: self.inner.dir.clone(),
                source,
            })?;

        let file = registry.state_file::<VM>(&self.inner.owner_type);
        let view_model = Rc::new(factory());
        let state = view_model.state();
        state.initialize(
            store,
            file,
            self.inner.mode == ProviderMode::Restoring,
            self.inner.default_state.as_ref(),
        )?;
        state.set_save_required(self.inner.save_required.get());

        registry.insert(&self.inner.owner_type, Rc::clone(&view_model));
        tracing::debug!(
            owner = %self.inner.owner_type,
            view_model = std::any::type_name::<VM>(),
            "Registered view model"
        );
        Ok(view_model)
    }

    /// React to an owner lifecycle event.
    pub fn on_event(&self, event: LifecycleEvent) -> Result<()> {
        match event {
            LifecycleEvent::Started | LifecycleEvent::Resumed => {
                self.on_foreground();
                Ok(())
            }
            LifecycleEvent::Paused(reason) | LifecycleEvent::Stopped(reason) => {
                self.on_background(reason)
            }
            LifecycleEvent::Destroyed => {
                self.release();
                Ok(())
            }
        }
    }

    fn on_foreground(&self) {
        self.inner.save_required.set(false);
        for state in self.inner.registry.states(&self.inner.owner_type) {
            state.set_save_required(false);
        }
        tracing::debug!(owner = %self.inner.owner_type, "Foreground: saves deferred");
    }

    fn on_background(&self, reason: PauseReason) -> Result<()> {
        if reason == PauseReason::ConfigurationChange {
            tracing::debug!(
                owner = %self.inner.owner_type,
                "Configuration change: keeping state in memory"
            );
            return Ok(());
        }

        self.inner.save_required.set(true);
        for state in self.inner.registry.states(&self.inner.owner_type) {
            state.set_save_required(true);
            state.save_state()?;
        }
        tracing::debug!(owner = %self.inner.owner_type, "Background: state checkpointed");
        Ok(())
    }

    /// Unsubscribe from the lifecycle and drop the owner binding.
    fn release(&self) {
        let binding = self.inner.binding.borrow_mut().take();
        if let Some(LifecycleBinding {
            source,
            subscription,
        }) = binding.and_then(|b| b.lifecycle)
        {
            source.unsubscribe(subscription);
        }
        tracing::debug!(owner = %self.inner.owner_type, "Provider released");
    }
}
