#![forbid(unsafe_code)]

//! Typed event emitters with scoped subscriptions.
//!
//! Widget lifecycle notifications (activate, dispose, visibility) flow
//! through [`Emitter`]s. Listening returns a [`Subscription`] whose drop
//! unsubscribes, and a [`DisposalBag`] collects subscriptions so a whole
//! scope tears down together.
//!
//! # Invariants
//!
//! - `fire` snapshots the listener list before invoking, so a listener may
//!   subscribe or unsubscribe (including itself) during delivery without
//!   deadlocking the table.
//! - A listener must not synchronously fire the emitter it is currently
//!   handling; that re-entry would deadlock on the listener's own cell.
//! - Dropping the emitter drops all listeners; outstanding subscriptions
//!   become no-ops.

use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Arc<Mutex<dyn FnMut(&T) + Send>>;

struct ListenerTable<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

impl<T> ListenerTable<T> {
    fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

/// A single-event broadcast channel.
pub struct Emitter<T> {
    table: Arc<Mutex<ListenerTable<T>>>,
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Emitter<T> {
    /// Create an emitter with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(ListenerTable::new())),
        }
    }

    /// Register a listener. Dropping the returned subscription removes it.
    pub fn subscribe(&self, listener: impl FnMut(&T) + Send + 'static) -> Subscription
    where
        T: 'static,
    {
        let id = {
            let mut table = match self.table.lock() {
                Ok(t) => t,
                Err(poisoned) => poisoned.into_inner(),
            };
            let id = table.next_id;
            table.next_id += 1;
            table.entries.push((id, Arc::new(Mutex::new(listener))));
            id
        };

        let weak: Weak<Mutex<ListenerTable<T>>> = Arc::downgrade(&self.table);
        Subscription::from_fn(move || {
            if let Some(table) = weak.upgrade()
                && let Ok(mut table) = table.lock()
            {
                table.entries.retain(|(eid, _)| *eid != id);
            }
        })
    }

    /// Deliver an event to every listener registered at call time.
    pub fn fire(&self, event: &T) {
        let snapshot: Vec<Callback<T>> = {
            let table = match self.table.lock() {
                Ok(t) => t,
                Err(poisoned) => poisoned.into_inner(),
            };
            table.entries.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for cb in snapshot {
            if let Ok(mut f) = cb.lock() {
                f(event);
            }
        }
    }

    /// Number of live listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.table.lock().map(|t| t.entries.len()).unwrap_or(0)
    }
}

impl<T> std::fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// A registration that undoes itself when dropped.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap an arbitrary cleanup action.
    #[must_use]
    pub fn from_fn(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription that does nothing on drop.
    #[must_use]
    pub fn empty() -> Self {
        Self { cancel: None }
    }

    /// Keep the listener alive for the emitter's whole lifetime.
    pub fn detach(mut self) {
        self.cancel = None;
    }

    /// Run the cleanup now instead of at drop.
    pub fn dispose(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Collects subscriptions for grouped teardown.
#[derive(Debug, Default)]
pub struct DisposalBag {
    items: Vec<Subscription>,
}

impl DisposalBag {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription to the bag.
    pub fn push(&mut self, sub: Subscription) {
        self.items.push(sub);
    }

    /// Dispose everything collected so far.
    pub fn dispose_all(&mut self) {
        self.items.clear();
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the bag holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
