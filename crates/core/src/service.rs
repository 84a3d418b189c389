//! Catalog service: the consistency layer between page consumers, the
//! local cache and the remote document.
//!
//! ### Read policy (stale-while-revalidate)
//!
//! - **Fresh** cache entry (younger than the TTL): served, no network.
//! - **Stale** cache entry: served immediately; one background fetch
//!   refreshes the cache and fans out to subscribers. Its failure is logged.
//! - **No usable entry** (absent, corrupt, or every category empty):
//!   blocking fetch. On failure the empty catalog is returned.
//!
//! `read()` never fails.
//!
//! ### Write policy (optimistic)
//!
//! The candidate document goes into the cache before the remote write, so
//! later reads in this process see it at once. A failed remote write is
//! returned to the caller and the cache entry is left as is; the next
//! refresh or push brings it back in line with the remote.
//!
//! A background refresh whose fetch began before a write was confirmed, or
//! before a push arrived, is discarded when it lands.
//!
//! Writes are whole-document and last-writer-wins across clients. There is
//! no version check.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::cache::{CacheEntry, LocalCache};
use crate::config::AppConfig;
use crate::remote::{RemoteStore, SubscriptionHandle};
use crate::subscribers::{Registry, Subscription};
use crate::{App, Catalog, Category, Error};

/// Tunables for [`CatalogService`].
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Cache freshness window (default: 5 minutes).
    pub ttl: Duration,
    /// Extra attempts for blocking fetches after a transport failure (default: 2).
    pub fetch_retries: u32,
    /// First retry delay, doubled per attempt (default: 200ms).
    pub retry_backoff: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self { ttl: Duration::from_secs(300), fetch_retries: 2, retry_backoff: Duration::from_millis(200) }
    }
}

impl From<&AppConfig> for ServiceOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            ttl: config.cache_ttl(),
            fetch_retries: config.fetch_retries,
            retry_backoff: config.retry_backoff(),
        }
    }
}

/// Orders cache writes against background refreshes.
///
/// `generation` only changes while `lock` is held, so a refresh that
/// checks it under the lock cannot interleave with a write.
#[derive(Debug, Default)]
struct SlotGuard {
    lock: Mutex<()>,
    generation: AtomicU64,
}

impl SlotGuard {
    fn current(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Caller holds `lock`.
    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

#[derive(Default)]
struct PushState {
    handle: Option<SubscriptionHandle>,
    pump: Option<JoinHandle<()>>,
}

struct Inner<R> {
    remote: R,
    cache: LocalCache,
    options: ServiceOptions,
    subscribers: Arc<Registry>,
    refreshing: AtomicBool,
    slot: Arc<SlotGuard>,
    push: Mutex<PushState>,
}

/// Mediates all catalog reads and writes for one process.
///
/// Construct once and hand clones to consumers; clones share the cache
/// handle, subscriber registry and push subscription.
pub struct CatalogService<R: RemoteStore> {
    inner: Arc<Inner<R>>,
}

impl<R: RemoteStore> Clone for CatalogService<R> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<R: RemoteStore> CatalogService<R> {
    pub fn new(remote: R, cache: LocalCache, options: ServiceOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                remote,
                cache,
                options,
                subscribers: Registry::new(),
                refreshing: AtomicBool::new(false),
                slot: Arc::new(SlotGuard::default()),
                push: Mutex::new(PushState::default()),
            }),
        }
    }

    pub fn remote(&self) -> &R {
        &self.inner.remote
    }

    pub fn cache(&self) -> &LocalCache {
        &self.inner.cache
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.inner.options
    }

    /// Number of registered update callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Best available catalog. Never fails.
    pub async fn read(&self) -> Catalog {
        if let Some(entry) = self.usable_entry().await {
            if entry.is_fresh(Utc::now(), self.inner.options.ttl) {
                tracing::debug!("serving fresh cached catalog");
                return entry.document;
            }
            tracing::debug!(age_ms = entry.age(Utc::now()).as_millis() as u64, "serving stale catalog, revalidating");
            self.spawn_refresh();
            return entry.document;
        }

        tracing::debug!("no usable cached catalog, fetching");
        match self.fetch_with_retry().await {
            Ok(doc) => {
                self.inner.cache.set(&doc).await;
                doc
            }
            Err(e) => {
                tracing::warn!(error = %e, "catalog fetch failed, serving empty catalog");
                Catalog::empty()
            }
        }
    }

    /// Fetch the remote document now, bypassing freshness.
    ///
    /// On success the cache is replaced and subscribers are notified. On
    /// failure any usable cached catalog is served, else the empty one.
    pub async fn refresh(&self) -> Catalog {
        match self.fetch_with_retry().await {
            Ok(doc) => {
                self.inner.cache.set(&doc).await;
                self.inner.subscribers.notify(&doc);
                doc
            }
            Err(e) => {
                tracing::warn!(error = %e, "catalog refresh failed, falling back to cache");
                self.usable_entry()
                    .await
                    .map(|entry| entry.document)
                    .unwrap_or_default()
            }
        }
    }

    /// Cached catalog regardless of age, or the empty catalog. No network.
    pub async fn cached(&self) -> Catalog {
        self.inner.cache.get().await.map(|entry| entry.document).unwrap_or_default()
    }

    /// Apply `mutate` to the current catalog and write the result.
    ///
    /// Returns the written document, or the remote error. On error the
    /// optimistic cache entry is kept.
    pub async fn write<F>(&self, mutate: F) -> Result<Catalog, Error>
    where
        F: FnOnce(Catalog) -> Catalog,
    {
        self.try_write(|doc| Ok(mutate(doc))).await
    }

    /// Like [`write`](Self::write) for mutations that can fail. A mutation
    /// error aborts before the cache or the remote is touched.
    pub async fn try_write<F>(&self, mutate: F) -> Result<Catalog, Error>
    where
        F: FnOnce(Catalog) -> Result<Catalog, Error>,
    {
        let current = self.current_for_write().await?;
        let candidate = mutate(current)?;

        {
            let _held = self.inner.slot.lock.lock().await;
            self.inner.slot.bump();
            self.inner.cache.set(&candidate).await;
        }

        let start = Instant::now();
        match self.inner.remote.write_all(&candidate).await {
            Ok(()) => {
                {
                    let _held = self.inner.slot.lock.lock().await;
                    self.inner.slot.bump();
                }
                tracing::info!(
                    apps = candidate.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "catalog write confirmed"
                );
                Ok(candidate)
            }
            Err(e) => {
                tracing::warn!(error = %e, "catalog write failed, cache keeps unconfirmed document");
                Err(e)
            }
        }
    }

    /// Add a new record to its category and to `latest`.
    pub async fn add_app(&self, app: App) -> Result<Catalog, Error> {
        self.write(move |mut doc| {
            doc.insert_app(app);
            doc
        })
        .await
    }

    /// Replace the record at `section[index]`, keeping `latest` in step.
    pub async fn update_app(&self, section: Category, index: usize, app: App) -> Result<Catalog, Error> {
        self.try_write(move |mut doc| {
            doc.replace_app(section, index, app)?;
            Ok(doc)
        })
        .await
    }

    /// Delete the record at `section[index]` and its `latest` copy.
    pub async fn delete_app(&self, section: Category, index: usize) -> Result<App, Error> {
        let mut removed = None;
        self.try_write(|mut doc| {
            removed = Some(doc.remove_app(section, index)?);
            Ok(doc)
        })
        .await?;
        removed.ok_or_else(|| Error::InvalidInput(format!("no app at {section}[{index}]")))
    }

    /// Register `callback` for every catalog update.
    ///
    /// Updates come from background refreshes and from the remote push
    /// subscription, which is attached on the first registration.
    pub async fn on_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Catalog) + Send + Sync + 'static,
    {
        let subscription = self.inner.subscribers.register(Arc::new(callback));
        self.ensure_push().await;
        subscription
    }

    pub async fn clear_cache(&self) {
        self.inner.cache.clear().await;
    }

    /// Detach the remote push subscription. Safe to call more than once.
    pub async fn shutdown(&self) {
        let mut push = self.inner.push.lock().await;
        if let Some(handle) = push.handle.take() {
            self.inner.remote.unsubscribe(handle);
            tracing::info!(subscription = handle.id(), "detached push subscription");
        }
        if let Some(pump) = push.pump.take() {
            pump.abort();
        }
    }

    async fn usable_entry(&self) -> Option<CacheEntry> {
        self.inner.cache.get().await.filter(CacheEntry::is_usable)
    }

    /// Starting point for a write: fresh cache, else the remote, else a
    /// stale cache. With nothing known the write is refused rather than
    /// clobbering the remote.
    async fn current_for_write(&self) -> Result<Catalog, Error> {
        let cached = self.usable_entry().await;
        if let Some(entry) = &cached
            && entry.is_fresh(Utc::now(), self.inner.options.ttl)
        {
            return Ok(entry.document.clone());
        }

        match self.fetch_with_retry().await {
            Ok(doc) => {
                self.inner.cache.set(&doc).await;
                Ok(doc)
            }
            Err(e) => match cached {
                Some(entry) => {
                    tracing::warn!(error = %e, "fetch before write failed, building on stale cache");
                    Ok(entry.document)
                }
                None => Err(e),
            },
        }
    }

    async fn fetch_with_retry(&self) -> Result<Catalog, Error> {
        let mut backoff = self.inner.options.retry_backoff;
        let mut attempt = 0;
        loop {
            let start = Instant::now();
            match self.inner.remote.fetch_once().await {
                Ok(doc) => {
                    tracing::debug!(
                        apps = doc.len(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "fetched remote catalog"
                    );
                    return Ok(doc);
                }
                Err(e) if e.is_transport() && attempt < self.inner.options.fetch_retries => {
                    attempt += 1;
                    tracing::warn!(error = %e, attempt, "catalog fetch failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One background fetch at a time; a stale read while one is pending
    /// rides on it. A fetch that started before a local write or a push is
    /// older than the cache and is dropped.
    fn spawn_refresh(&self) {
        if self.inner.refreshing.swap(true, Ordering::AcqRel) {
            tracing::debug!("background refresh already in flight");
            return;
        }

        let started = self.inner.slot.current();
        let service = self.clone();
        tokio::spawn(async move {
            let inner = &service.inner;
            match inner.remote.fetch_once().await {
                Ok(doc) => {
                    let held = inner.slot.lock.lock().await;
                    if inner.slot.current() == started {
                        inner.cache.set(&doc).await;
                        drop(held);
                        inner.subscribers.notify(&doc);
                    } else {
                        tracing::debug!("cache changed during background refresh, dropping fetched catalog");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "background refresh failed"),
            }
            inner.refreshing.store(false, Ordering::Release);
        });
    }

    async fn ensure_push(&self) {
        let mut push = self.inner.push.lock().await;
        let pump_alive = push.pump.as_ref().is_some_and(|pump| !pump.is_finished());
        if pump_alive {
            return;
        }
        if let Some(stale) = push.handle.take() {
            self.inner.remote.unsubscribe(stale);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        match self.inner.remote.subscribe(tx).await {
            Ok(handle) => {
                let pump = tokio::spawn(pump_updates(
                    rx,
                    self.inner.cache.clone(),
                    Arc::clone(&self.inner.slot),
                    Arc::clone(&self.inner.subscribers),
                ));
                push.handle = Some(handle);
                push.pump = Some(pump);
                tracing::info!(subscription = handle.id(), "attached push subscription");
            }
            Err(e) => tracing::warn!(error = %e, "push subscription failed, will retry on next registration"),
        }
    }
}

/// Apply pushed documents to the cache and fan them out.
async fn pump_updates(
    mut rx: mpsc::UnboundedReceiver<Catalog>,
    cache: LocalCache,
    slot: Arc<SlotGuard>,
    subscribers: Arc<Registry>,
) {
    while let Some(doc) = rx.recv().await {
        {
            let _held = slot.lock.lock().await;
            slot.bump();
            cache.set(&doc).await;
        }
        subscribers.notify(&doc);
    }
    tracing::debug!("push stream closed");
}
