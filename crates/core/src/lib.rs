//! Core types and shared functionality for appshelf.
//!
//! This crate provides:
//! - The catalog document model and its `latest` maintenance rules
//! - Local single-slot cache with SQLite backend
//! - The remote store contract and an in-memory implementation
//! - The catalog service (stale-while-revalidate reads, optimistic writes)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod remote;
pub mod service;
pub mod subscribers;

pub use cache::{CacheEntry, LocalCache};
pub use catalog::{App, Catalog, Category};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use remote::{ChangeSink, MemoryRemoteStore, RemoteStore, SubscriptionHandle};
pub use service::{CatalogService, ServiceOptions};
pub use subscribers::Subscription;
