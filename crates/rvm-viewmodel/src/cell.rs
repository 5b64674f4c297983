//! Observable cells with write-through persistence.
//!
//! # Invariants
//!
//! 1. A successful `set` records the value in the owning view model's state
//!    record before anything else happens.
//! 2. When the owner requires saves, the whole record is on disk before
//!    observers run.
//! 3. Observers are notified in registration order, once per successful `set`.
//! 4. Dropping a [`Subscription`] detaches its observer before the next
//!    notification.
//! 5. A cell that outlives its view model keeps working in memory only.
//!
//! # Failure Modes
//!
//! - **Save fails**: `set` returns the error. The record already holds the
//!   new value, but the cell keeps its old value and observers are not told.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use rvm_persistence::ToStateValue;

use crate::error::Result;
use crate::state::{StateInner, write_through};

struct Observer<T>(Box<dyn Fn(&T)>);

struct CellInner<T> {
    key: String,
    value: Option<T>,
    version: u64,
    owner: Weak<RefCell<StateInner>>,
    observers: Vec<Weak<Observer<T>>>,
}

/// A named, observable value slot owned by a view model.
///
/// Cloning a `StateCell` creates a new handle to the **same** cell; the view
/// model hands out clones of the one cell it caches per key.
pub struct StateCell<T> {
    inner: Rc<RefCell<CellInner<T>>>,
}

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("StateCell")
            .field("key", &inner.key)
            .field("value", &inner.value)
            .field("version", &inner.version)
            .finish()
    }
}

/// RAII guard for an observer; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the observer"]
pub struct Subscription {
    _observer: Rc<dyn Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

impl<T: ToStateValue + Clone + 'static> StateCell<T> {
    pub(crate) fn new(
        key: impl Into<String>,
        value: Option<T>,
        owner: Weak<RefCell<StateInner>>,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CellInner {
                key: key.into(),
                value,
                version: 0,
                owner,
                observers: Vec::new(),
            })),
        }
    }

    pub fn key(&self) -> String {
        self.inner.borrow().key.clone()
    }

    /// Current value, or `None` if the cell was never given one.
    pub fn get(&self) -> Option<T> {
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value without cloning.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.inner.borrow().value.as_ref())
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.borrow().value.is_some()
    }

    /// Number of successful `set` calls.
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Whether both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Assign a new value.
    ///
    /// Writes through to the owning view model's record, saves the whole
    /// record if the owner currently requires saves, then updates the cell
    /// and notifies observers.
    pub fn set(&self, value: T) -> Result<()> {
        let (key, owner) = {
            let inner = self.inner.borrow();
            (inner.key.clone(), inner.owner.clone())
        };
        write_through(&owner, &key, value.to_state_value())?;

        let observers: Vec<Rc<Observer<T>>> = {
            let mut inner = self.inner.borrow_mut();
            inner.value = Some(value.clone());
            inner.version += 1;
            inner.observers.retain(|w| w.strong_count() > 0);
            inner.observers.iter().filter_map(Weak::upgrade).collect()
        };
        tracing::debug!(key = %key, observers = observers.len(), "Cell updated");

        for observer in observers {
            (observer.0)(&value);
        }
        Ok(())
    }

    /// Run `callback` after every successful `set` until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let observer = Rc::new(Observer(Box::new(callback) as Box<dyn Fn(&T)>));
        self.inner
            .borrow_mut()
            .observers
            .push(Rc::downgrade(&observer));
        Subscription {
            _observer: observer,
        }
    }
}
