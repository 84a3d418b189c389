//! Remote document store contract.
//!
//! The remote side holds the whole catalog as one document at a fixed
//! path. Writes replace the entire document (last writer wins); there is no
//! merge and no compare-and-swap. Adapters do not retry: retry policy
//! belongs to the catalog service.
//!
//! ## Implementations
//!
//! - [`memory::MemoryRemoteStore`]: in-process store for tests and offline use
//! - `appshelf_client::RestRemoteStore`: realtime-database REST endpoint

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{Catalog, Error};

pub mod memory;

pub use memory::{FailureMode, MemoryRemoteStore};

/// Where pushed documents are delivered.
pub type ChangeSink = mpsc::UnboundedSender<Catalog>;

/// Identifies one live push subscription on a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Abstract interface for the remote catalog document.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// One-shot read of the full document.
    ///
    /// Fails with `RemoteUnavailable` on transport errors.
    async fn fetch_once(&self) -> Result<Catalog, Error>;

    /// Overwrite the full document.
    ///
    /// Fails with `RemoteUnavailable` or `RemoteRejected`.
    async fn write_all(&self, doc: &Catalog) -> Result<(), Error>;

    /// Attach a push listener.
    ///
    /// The store sends the current document once on attach and again after
    /// every remote mutation from any client.
    async fn subscribe(&self, on_change: ChangeSink) -> Result<SubscriptionHandle, Error>;

    /// Stop delivery for `handle` and release its connection. Unknown or
    /// already released handles are ignored.
    fn unsubscribe(&self, handle: SubscriptionHandle);
}
