//! Listener registration.
//!
//! [`ListenerTable`] maps opaque [`ListenerHandle`]s to typed callbacks. It is
//! shared between caller threads (add/remove) and the backend callback thread
//! (dispatch), so every mutation goes through one mutex and dispatch never
//! iterates the live list.
//!
//! # Snapshot semantics
//! Mutations are copy-on-write: `add`/`remove` build a new entry list under the
//! lock and swap it in. [`ListenerTable::snapshot`] hands out the current list
//! behind an `Arc`, so a dispatch pass keeps iterating exactly the entries it
//! started with.
//! - A listener added during a pass is not called for that pass.
//! - A listener removed during a pass may still be called for that pass, but
//!   never after `remove` has returned and a new pass has started.
//! - Entries are reference counted; removal never leaves a dangling callback.

use crate::event::TouchEvent;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Receives decoded touch events.
///
/// Called on the backend's callback thread. Implementations must not call
/// [`Session::select_device`](crate::session::Session::select_device) from
/// here; that call is rejected.
pub trait TouchListener: Send + Sync {
    fn on_touch(&self, event: &TouchEvent);

    /// Whole decoded frame, called once per frame before its events are fanned
    /// out, and also for frames with no fingers down (`events` is empty).
    fn on_frame(&self, events: &[TouchEvent]) {
        let _ = events;
    }
}

impl<F> TouchListener for F
where
    F: Fn(&TouchEvent) + Send + Sync,
{
    fn on_touch(&self, event: &TouchEvent) {
        self(event)
    }
}

/// Opaque token naming one registration.
///
/// Handles are never reused by the table that issued them. Removing a handle
/// twice (or one from another table) is a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerHandle(u64);

impl fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// One registered listener.
#[derive(Clone)]
pub struct ListenerEntry {
    handle: ListenerHandle,
    listener: Arc<dyn TouchListener>,
}

impl ListenerEntry {
    pub fn handle(&self) -> ListenerHandle {
        self.handle
    }

    pub fn listener(&self) -> &dyn TouchListener {
        self.listener.as_ref()
    }
}

impl fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

struct Inner {
    next_id: u64,
    entries: Arc<Vec<ListenerEntry>>,
}

/// Concurrent-safe, insertion-ordered listener registry.
pub struct ListenerTable {
    inner: Mutex<Inner>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 0,
                entries: Arc::new(Vec::new()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Listeners never run under this lock, so a poisoned guard still holds
        // a consistent list.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a listener and returns its handle. Never fails.
    pub fn add(&self, listener: impl TouchListener + 'static) -> ListenerHandle {
        self.add_shared(Arc::new(listener))
    }

    /// Registers an already shared listener.
    pub fn add_shared(&self, listener: Arc<dyn TouchListener>) -> ListenerHandle {
        let mut inner = self.lock();
        let handle = ListenerHandle(inner.next_id);
        inner.next_id += 1;

        let mut entries = Vec::with_capacity(inner.entries.len() + 1);
        entries.extend(inner.entries.iter().cloned());
        entries.push(ListenerEntry { handle, listener });
        inner.entries = Arc::new(entries);

        tracing::trace!(%handle, count = inner.entries.len(), "listener added");
        handle
    }

    /// Unregisters a listener.
    ///
    /// Returns `true` if the handle was live. Unknown or already removed
    /// handles leave the table untouched.
    pub fn remove(&self, handle: ListenerHandle) -> bool {
        let mut inner = self.lock();
        if !inner.entries.iter().any(|e| e.handle == handle) {
            tracing::trace!(%handle, "remove ignored for unknown listener");
            return false;
        }

        let entries: Vec<ListenerEntry> = inner
            .entries
            .iter()
            .filter(|e| e.handle != handle)
            .cloned()
            .collect();
        inner.entries = Arc::new(entries);

        tracing::trace!(%handle, count = inner.entries.len(), "listener removed");
        true
    }

    /// Stable view of the table at this instant, in insertion order.
    pub fn snapshot(&self) -> Arc<Vec<ListenerEntry>> {
        Arc::clone(&self.lock().entries)
    }

    pub fn contains(&self, handle: ListenerHandle) -> bool {
        self.lock().entries.iter().any(|e| e.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every listener. Handles issued so far become dead.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries = Arc::new(Vec::new());
    }
}

impl Default for ListenerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ListenerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerTable")
            .field("len", &self.len())
            .finish()
    }
}
