//! Owner lifecycle events and the source that delivers them.
//!
//! The host UI binding owns the real lifecycle; it translates its callbacks
//! into [`LifecycleEvent`]s and dispatches them through a [`LifecycleSource`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::Result;

/// Why an owner is leaving the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// The owner is about to be recreated immediately (e.g. rotation).
    ConfigurationChange,
    /// The owner is going to the background and may be killed.
    Backgrounded,
}

/// Lifecycle phase transitions a provider reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started,
    Resumed,
    Paused(PauseReason),
    Stopped(PauseReason),
    Destroyed,
}

/// Handler registered against a lifecycle source.
pub type LifecycleHandler = Box<dyn Fn(LifecycleEvent) -> Result<()>>;

/// Identifies one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Something that delivers lifecycle events to registered handlers.
pub trait LifecycleSource {
    fn subscribe(&self, handler: LifecycleHandler) -> SubscriptionId;

    /// Remove a handler. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// A plain lifecycle dispatcher for host bindings and tests.
#[derive(Default)]
pub struct Lifecycle {
    handlers: RefCell<Vec<(SubscriptionId, Rc<dyn Fn(LifecycleEvent) -> Result<()>>)>>,
    next_id: Cell<u64>,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("handlers", &self.handlers.borrow().len())
            .finish()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// Deliver `event` to every handler in registration order.
    ///
    /// Stops at the first handler error. Handlers may subscribe or
    /// unsubscribe while the event is being delivered; a handler removed
    /// mid-dispatch is not called.
    pub fn dispatch(&self, event: LifecycleEvent) -> Result<()> {
        let snapshot: Vec<_> = self.handlers.borrow().clone();
        for (id, handler) in snapshot {
            let still_registered = self.handlers.borrow().iter().any(|(h, _)| *h == id);
            if still_registered {
                handler(event)?;
            }
        }
        Ok(())
    }
}

impl LifecycleSource for Lifecycle {
    fn subscribe(&self, handler: LifecycleHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((id, Rc::from(handler)));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.handlers.borrow_mut().retain(|(h, _)| *h != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewModelError;

    #[test]
    fn test_dispatch_order_and_unsubscribe() {
        let lifecycle = Rc::new(Lifecycle::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let first = {
            let log = Rc::clone(&log);
            lifecycle.subscribe(Box::new(move |e| {
                log.borrow_mut().push(format!("a:{e:?}"));
                Ok(())
            }))
        };
        {
            let log = Rc::clone(&log);
            lifecycle.subscribe(Box::new(move |e| {
                log.borrow_mut().push(format!("b:{e:?}"));
                Ok(())
            }));
        }

        lifecycle.dispatch(LifecycleEvent::Resumed).unwrap();
        lifecycle.unsubscribe(first);
        lifecycle.dispatch(LifecycleEvent::Destroyed).unwrap();

        assert_eq!(*log.borrow(), vec!["a:Resumed", "b:Resumed", "b:Destroyed"]);
    }

    #[test]
    fn test_handler_can_unsubscribe_itself() {
        let lifecycle = Rc::new(Lifecycle::new());
        let id = Rc::new(Cell::new(None));
        let handle = Rc::clone(&lifecycle);
        let own_id = Rc::clone(&id);
        let sub = lifecycle.subscribe(Box::new(move |_| {
            if let Some(id) = own_id.get() {
                handle.unsubscribe(id);
            }
            Ok(())
        }));
        id.set(Some(sub));

        lifecycle.dispatch(LifecycleEvent::Destroyed).unwrap();
        assert_eq!(lifecycle.handler_count(), 0);
    }

    #[test]
    fn test_dispatch_stops_at_first_error() {
        let lifecycle = Lifecycle::new();
        let reached = Rc::new(Cell::new(false));
        lifecycle.subscribe(Box::new(|_| Err(ViewModelError::ProviderReleased)));
        {
            let reached = Rc::clone(&reached);
            lifecycle.subscribe(Box::new(move |_| {
                reached.set(true);
                Ok(())
            }));
        }

        assert!(lifecycle.dispatch(LifecycleEvent::Resumed).is_err());
        assert!(!reached.get());
    }
}
