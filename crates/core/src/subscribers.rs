//! Observer registry for catalog updates.
//!
//! Callbacks run in registration order. A panicking callback is logged
//! and skipped so the rest still receive the update.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::Catalog;

/// Callback invoked with the latest catalog.
pub type UpdateCallback = Arc<dyn Fn(&Catalog) + Send + Sync>;

#[derive(Default)]
pub struct Registry {
    entries: Mutex<Vec<(u64, UpdateCallback)>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(u64, UpdateCallback)>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a callback, returning its disposal handle.
    pub fn register(self: &Arc<Self>, callback: UpdateCallback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries().push((id, callback));
        Subscription { id, registry: Arc::downgrade(self) }
    }

    /// Remove a callback. Returns false if it was already gone.
    pub fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Deliver `doc` to every callback. Returns how many completed.
    ///
    /// The callback list is snapshotted first, so callbacks may register or
    /// unsubscribe during delivery.
    pub fn notify(&self, doc: &Catalog) -> usize {
        let snapshot: Vec<(u64, UpdateCallback)> = self.entries().clone();
        let mut delivered = 0;
        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(doc))) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::warn!(subscriber = id, "update callback panicked"),
            }
        }
        tracing::debug!(delivered, "fanned out catalog update");
        delivered
    }
}

/// Handle returned by `on_update`.
///
/// Dropping the handle keeps the callback registered; call
/// [`Subscription::unsubscribe`] to stop deliveries.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop deliveries to this callback. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, UpdateCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&count);
        let callback: UpdateCallback = Arc::new(move |_: &Catalog| {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    fn failing(_: &Catalog) {
        panic!("render failed")
    }

    #[test]
    fn test_registration_order() {
        let registry = Registry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            registry.register(Arc::new(move |_: &Catalog| order.lock().unwrap().push(n)));
        }

        registry.notify(&Catalog::empty());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_callback_is_isolated() {
        let registry = Registry::new();
        registry.register(Arc::new(failing));
        let (count, callback) = counter();
        registry.register(callback);

        let delivered = registry.notify(&Catalog::empty());

        assert_eq!(delivered, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let registry = Registry::new();
        let (count, callback) = counter();
        let subscription = registry.register(callback);

        subscription.unsubscribe();
        subscription.unsubscribe();
        registry.notify(&Catalog::empty());

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped() {
        let registry = Registry::new();
        let (_, callback) = counter();
        let subscription = registry.register(callback);
        drop(registry);
        subscription.unsubscribe();
    }
}
