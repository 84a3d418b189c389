//! SQLite-backed local cache for the catalog document.
//!
//! This module provides the single expiring slot the catalog service reads
//! before going to the network. It persists across process restarts using
//! SQLite with async access via tokio-rusqlite, and supports:
//!
//! - Whole-record replacement under one well-known key
//! - Discarding records written in an older layout
//! - WAL mode for concurrent access
//! - Degrading storage failures to a cache miss

pub mod connection;
pub mod schema;
pub mod slot;

pub use crate::Error;

pub use connection::LocalCache;
pub use slot::{CACHE_KEY, CacheEntry};
