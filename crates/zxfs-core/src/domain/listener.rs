//! Change notification for model objects
//!
//! Every host, rule and the controller own a [`ListenerSet`]. Notifications
//! are delivered synchronously, after the object's fields are updated, to a
//! snapshot of the registered listeners: a listener may add or remove
//! listeners (itself included) from inside its callback.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::newtypes::{HostKey, RuleName};
use super::sync_state::SyncState;

/// Stable key of a model object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelObject {
    Controller,
    Host(HostKey),
    Rule(HostKey, RuleName),
}

impl ModelObject {
    /// The host this object belongs to (`None` for the controller)
    pub fn host(&self) -> Option<&HostKey> {
        match self {
            ModelObject::Controller => None,
            ModelObject::Host(key) | ModelObject::Rule(key, _) => Some(key),
        }
    }
}

impl fmt::Display for ModelObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelObject::Controller => write!(f, "controller"),
            ModelObject::Host(key) => write!(f, "host {}", key),
            ModelObject::Rule(key, name) => write!(f, "rule {} on {}", name, key),
        }
    }
}

/// A change observed on a model object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    StateChanged {
        object: ModelObject,
        old: SyncState,
        new: SyncState,
    },
    ChildAdded {
        parent: ModelObject,
        child: ModelObject,
    },
    ChildRemoved {
        parent: ModelObject,
        child: ModelObject,
    },
    ContentChanged {
        object: ModelObject,
    },
}

impl ModelEvent {
    /// The object whose listeners receive this event
    pub fn source(&self) -> &ModelObject {
        match self {
            ModelEvent::StateChanged { object, .. } | ModelEvent::ContentChanged { object } => {
                object
            }
            ModelEvent::ChildAdded { parent, .. } | ModelEvent::ChildRemoved { parent, .. } => {
                parent
            }
        }
    }
}

/// Receives model change notifications
pub trait ModelListener: Send + Sync {
    /// Called synchronously for every event on the objects this listener is
    /// registered with. Errors are logged and never reach the notifier.
    fn on_event(&self, event: &ModelEvent) -> anyhow::Result<()>;
}

/// Token returned by [`ListenerSet::add`], used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Registered listeners of one object
#[derive(Default)]
pub struct ListenerSet {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn ModelListener>)>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn ModelListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    /// Returns false if `id` was not registered
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    /// Delivers `event` to every listener registered at call time.
    pub fn notify(&self, event: &ModelEvent) {
        let snapshot: Vec<Arc<dyn ModelListener>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(source = %event.source(), error = %e, "Model listener failed");
                }
                Err(_) => {
                    warn!(source = %event.source(), "Model listener panicked");
                }
            }
        }
    }
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    struct Counter(AtomicUsize);

    impl ModelListener for Counter {
        fn on_event(&self, _event: &ModelEvent) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl ModelListener for Failing {
        fn on_event(&self, _event: &ModelEvent) -> anyhow::Result<()> {
            anyhow::bail!("listener exploded")
        }
    }

    struct Panicking;

    impl ModelListener for Panicking {
        fn on_event(&self, _event: &ModelEvent) -> anyhow::Result<()> {
            panic!("listener panicked");
        }
    }

    fn event() -> ModelEvent {
        ModelEvent::ContentChanged {
            object: ModelObject::Controller,
        }
    }

    #[test]
    fn test_add_notify_remove() {
        let set = ListenerSet::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let id = set.add(counter.clone());

        set.notify(&event());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        assert!(set.remove(id));
        assert!(!set.remove(id));
        set.notify(&event());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn test_failing_listener_does_not_block_others() {
        let set = ListenerSet::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        set.add(Arc::new(Failing));
        set.add(Arc::new(Panicking));
        set.add(counter.clone());

        set.notify(&event());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    /// Removes itself from the set while being notified.
    struct SelfRemoving {
        set: Arc<ListenerSet>,
        id: Mutex<Option<ListenerId>>,
        calls: AtomicUsize,
    }

    impl ModelListener for SelfRemoving {
        fn on_event(&self, _event: &ModelEvent) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = self.id.lock().take() {
                self.set.remove(id);
            }
            Ok(())
        }
    }

    #[test]
    fn test_listener_can_remove_itself_during_notification() {
        let set = Arc::new(ListenerSet::new());
        let listener = Arc::new(SelfRemoving {
            set: Arc::clone(&set),
            id: Mutex::new(None),
            calls: AtomicUsize::new(0),
        });
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let id = set.add(listener.clone());
        *listener.id.lock() = Some(id);
        set.add(counter.clone());

        set.notify(&event());
        set.notify(&event());

        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_event_source() {
        let host = HostKey::new("h1", 9090).unwrap();
        let ev = ModelEvent::ChildAdded {
            parent: ModelObject::Host(host.clone()),
            child: ModelObject::Rule(host.clone(), RuleName::new("Foo").unwrap()),
        };
        assert_eq!(ev.source(), &ModelObject::Host(host.clone()));
        assert_eq!(ev.source().host(), Some(&host));
    }
}
