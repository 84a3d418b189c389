//! Network client for appshelf.
//!
//! This crate provides the realtime-database REST remote store, its event
//! stream decoder, and the wiring that builds a catalog service from
//! configuration.

pub mod connect;
pub mod rest;

pub use connect::connect;
pub use rest::{DocumentEndpoint, RestConfig, RestRemoteStore, UrlError, document_url};
