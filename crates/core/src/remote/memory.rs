//! In-process remote store.
//!
//! Behaves like the hosted document service from the catalog service's
//! point of view: whole-document reads and writes, push delivery to every
//! subscriber on mutation. Adds call counters, failure injection and a
//! fetch gate so tests can observe the service's network behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{ChangeSink, RemoteStore, SubscriptionHandle};
use crate::{Catalog, Error};

/// Failure to inject into fetches or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    Unavailable,
    Rejected,
}

impl FailureMode {
    fn to_error(self, op: &str) -> Error {
        match self {
            FailureMode::Unavailable => Error::RemoteUnavailable(format!("{op}: simulated network failure")),
            FailureMode::Rejected => Error::RemoteRejected { status: Some(403), message: format!("{op}: permission denied") },
        }
    }
}

#[derive(Default)]
struct State {
    document: Catalog,
    fail_fetch: Option<FailureMode>,
    fail_write: Option<FailureMode>,
    fetch_gate: Option<Arc<Notify>>,
    subscribers: HashMap<u64, ChangeSink>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    fetch_calls: AtomicUsize,
    write_calls: AtomicUsize,
    next_id: AtomicU64,
}

/// Shared in-memory document store. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryRemoteStore {
    inner: Arc<Inner>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: Catalog) -> Self {
        let store = Self::new();
        store.state().document = document;
        store
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current stored document.
    pub fn document(&self) -> Catalog {
        self.state().document.clone()
    }

    /// Replace the stored document without notifying subscribers, as if a
    /// push had been missed.
    pub fn set_document(&self, document: Catalog) {
        self.state().document = document;
    }

    /// Simulate a write from another client: store and notify subscribers.
    pub fn push(&self, document: Catalog) {
        let mut state = self.state();
        state.document = document;
        Self::broadcast(&mut state);
    }

    pub fn fetch_calls(&self) -> usize {
        self.inner.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.inner.write_calls.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    pub fn fail_fetches(&self, mode: Option<FailureMode>) {
        self.state().fail_fetch = mode;
    }

    pub fn fail_writes(&self, mode: Option<FailureMode>) {
        self.state().fail_write = mode;
    }

    /// Hold every subsequent fetch until the returned gate is notified.
    ///
    /// Each `notify_one` releases one fetch.
    pub fn gate_fetches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state().fetch_gate = Some(Arc::clone(&gate));
        gate
    }

    fn broadcast(state: &mut State) {
        let document = state.document.clone();
        state
            .subscribers
            .retain(|_, sink| sink.send(document.clone()).is_ok());
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch_once(&self) -> Result<Catalog, Error> {
        self.inner.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.state().fetch_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let state = self.state();
        match state.fail_fetch {
            Some(mode) => Err(mode.to_error("fetch")),
            None => Ok(state.document.clone()),
        }
    }

    async fn write_all(&self, doc: &Catalog) -> Result<(), Error> {
        self.inner.write_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state();
        if let Some(mode) = state.fail_write {
            return Err(mode.to_error("write"));
        }
        state.document = doc.clone();
        Self::broadcast(&mut state);
        Ok(())
    }

    async fn subscribe(&self, on_change: ChangeSink) -> Result<SubscriptionHandle, Error> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if on_change.send(state.document.clone()).is_ok() {
            state.subscribers.insert(id, on_change);
        }
        Ok(SubscriptionHandle::new(id))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.state().subscribers.remove(&handle.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{App, Category};
    use tokio::sync::mpsc;

    fn catalog_with(title: &str) -> Catalog {
        let mut catalog = Catalog::empty();
        catalog.insert_app(App::new(title, Category::Game));
        catalog
    }

    #[tokio::test]
    async fn test_fetch_and_write() {
        let store = MemoryRemoteStore::new();
        assert!(store.fetch_once().await.unwrap().is_empty());

        let doc = catalog_with("Chess");
        store.write_all(&doc).await.unwrap();

        assert_eq!(store.fetch_once().await.unwrap(), doc);
        assert_eq!(store.fetch_calls(), 2);
        assert_eq!(store.write_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryRemoteStore::new();
        store.fail_fetches(Some(FailureMode::Unavailable));
        store.fail_writes(Some(FailureMode::Rejected));

        assert!(store.fetch_once().await.unwrap_err().is_transport());
        assert!(store.write_all(&Catalog::empty()).await.unwrap_err().is_rejection());
    }

    #[tokio::test]
    async fn test_subscribe_delivers_on_attach_and_push() {
        let store = MemoryRemoteStore::with_document(catalog_with("Chess"));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = store.subscribe(tx).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), store.document());

        let pushed = catalog_with("Go");
        store.push(pushed.clone());
        assert_eq!(rx.recv().await.unwrap(), pushed);

        store.unsubscribe(handle);
        store.unsubscribe(handle);
        assert_eq!(store.subscriber_count(), 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_set_document_does_not_notify() {
        let store = MemoryRemoteStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        store.subscribe(tx).await.unwrap();
        rx.recv().await.unwrap();

        store.set_document(catalog_with("Quiet"));
        assert!(rx.try_recv().is_err());
    }
}
