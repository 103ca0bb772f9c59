//! Typed multi-listener event fan-out.
//!
//! Listener lists are snapshotted (cloned) before an emission iterates them,
//! so `on`/`off` calls made from inside a listener never affect the emission
//! currently in flight.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Handle returned by [`Emitter::on`]; pass back to [`Emitter::off`] to
/// remove the listener, or drop the returned [`Subscription`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync + 'static>;

struct Entry<E> {
    id: ListenerId,
    listener: Listener<E>,
}

/// A registration that removes its listener when dropped.
#[must_use = "dropping a Subscription immediately unregisters its listener"]
pub struct Subscription<E> {
    id: ListenerId,
    emitter: Emitter<E>,
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.emitter.off(self.id);
    }
}

/// Registration-ordered fan-out for events of type `E`. Cheap to clone: all
/// clones share the same underlying listener list.
pub struct Emitter<E> {
    next_id: Arc<AtomicU64>,
    listeners: Arc<Mutex<Vec<Entry<E>>>>,
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            next_id: Arc::clone(&self.next_id),
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Emitter<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(0)),
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a listener, returning a [`Subscription`] that unregisters it
    /// on drop. Registration order is preserved for emission order.
    pub fn on<F>(&self, listener: F) -> Subscription<E>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Entry {
                id,
                listener: Arc::new(listener),
            });
        Subscription {
            id,
            emitter: self.clone(),
        }
    }

    /// Remove a listener by id. A no-op if the id is already removed,
    /// keeping `off` idempotent.
    pub fn off(&self, id: ListenerId) {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .retain(|entry| entry.id != id);
    }

    /// Invoke every registered listener, in registration order, against a
    /// snapshot of the listener list taken before iteration starts. A
    /// listener that panics is isolated: the panic is caught and the
    /// remaining listeners still run. `on_panic` receives the panic payload
    /// for forwarding to a debug hook.
    pub fn emit_with(&self, event: &E, mut on_panic: impl FnMut(Box<dyn std::any::Any + Send>)) {
        let snapshot: Vec<Listener<E>> = self
            .listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(|entry| Arc::clone(&entry.listener))
            .collect();

        for listener in snapshot {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                on_panic(payload);
            }
        }
    }

    /// Convenience over [`Emitter::emit_with`] that silently drops listener
    /// panics. Prefer `emit_with` when a debug hook should see them.
    pub fn emit(&self, event: &E) {
        self.emit_with(event, |_| {});
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn listeners_run_in_registration_order() {
        let emitter: Emitter<u32> = Emitter::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = Arc::clone(&order);
        let _a = emitter.on(move |_| o1.lock().unwrap().push(1));
        let o2 = Arc::clone(&order);
        let _b = emitter.on(move |_| o2.lock().unwrap().push(2));

        emitter.emit(&0);

        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn dropping_subscription_removes_listener() {
        let emitter: Emitter<u32> = Emitter::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_cb = Arc::clone(&calls);

        let sub = emitter.on(move |_| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
        });
        emitter.emit(&0);
        drop(sub);
        emitter.emit(&0);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_does_not_stop_others() {
        let emitter: Emitter<u32> = Emitter::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_cb = Arc::clone(&calls);

        let _a = emitter.on(|_| panic!("boom"));
        let _b = emitter.on(move |_| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
        });

        let mut panics = 0;
        emitter.emit_with(&0, |_| panics += 1);

        assert_eq!(panics, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn adding_listener_during_emission_does_not_affect_current_emission() {
        let emitter: Emitter<u32> = Emitter::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let emitter_inner = emitter.clone();
        let calls_cb = Arc::clone(&calls);
        let _a = emitter.on(move |_| {
            let calls_cb2 = Arc::clone(&calls_cb);
            std::mem::forget(emitter_inner.on(move |_| {
                calls_cb2.fetch_add(1, Ordering::SeqCst);
            }));
        });

        emitter.emit(&0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        emitter.emit(&0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
